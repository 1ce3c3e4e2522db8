//! Error types for tabmerge operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TabmergeError>;

#[derive(Error, Debug)]
pub enum TabmergeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Table load error: {path}: {message}")]
    TableLoad { path: PathBuf, message: String },

    #[error("Diff error: {message}")]
    Diff { message: String },

    #[error("Merge error: {message}")]
    Merge { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl TabmergeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn table_load(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::TableLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn diff(msg: impl Into<String>) -> Self {
        Self::Diff {
            message: msg.into(),
        }
    }

    pub fn merge(msg: impl Into<String>) -> Self {
        Self::Merge {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }
}

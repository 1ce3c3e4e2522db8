//! Command-line interface for tabmerge

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tabmerge")]
#[command(about = "A keyed tabular diff and transactional multi-user merge engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report which lines of side 1 are covered by side 2
    Coverage {
        /// File or folder whose lines are checked
        side1: PathBuf,

        /// File or folder providing the reference lines
        side2: PathBuf,

        /// File-name pattern applied when a side is a folder (e.g. "*.csv")
        #[arg(long)]
        pattern: Option<String>,

        /// Recurse into subfolders
        #[arg(long)]
        recursive: bool,

        /// Drop content at and after this literal marker before comparing
        #[arg(long)]
        truncate_at: Option<String>,

        /// Unique-line count that triggers the shrinking-set optimization
        #[arg(long, default_value = "1000000", value_parser = validate_positive)]
        optimize_threshold: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare two very large line files without loading them into memory
    CompareLarge {
        /// Left input file
        left: PathBuf,

        /// Right input file
        right: PathBuf,

        /// Lines per in-memory sort chunk (must be > 0)
        #[arg(long, default_value = "100000", value_parser = validate_positive)]
        chunk_lines: usize,

        /// Sample lines retained per result category
        #[arg(long, default_value = "2000")]
        samples: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keyed row diff between two tables sharing a schema
    Diff {
        /// Left (older) table
        left: PathBuf,

        /// Right (newer) table
        right: PathBuf,

        /// File configuration document (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Config entry to use; defaults to the left file's name
        #[arg(long)]
        file_name: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transactionally merge user folders into the target folder
    Merge {
        /// Baseline folder every user started from
        #[arg(long)]
        baseline: PathBuf,

        /// Authoritative target folder to merge into
        #[arg(long)]
        target: PathBuf,

        /// File configuration document (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Skip the duplicate-key pre-flight scan
        #[arg(long)]
        no_precheck: bool,

        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,

        /// User folders to merge, in order
        #[arg(required = true)]
        user_dirs: Vec<PathBuf>,
    },
}

/// Validate that a numeric option is greater than 0
fn validate_positive(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("Invalid value: '{}'. Must be a positive integer.", s))?;
    if value == 0 {
        return Err("Value must be greater than 0".to_string());
    }
    Ok(value)
}

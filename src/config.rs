//! Per-file merge configuration
//!
//! A JSON document maps table file names to their delimiter, key columns,
//! optional coarser dup-key columns and optional per-column date formats. The
//! provider is constructed explicitly and handed to every consumer; reloading
//! is an explicit caller decision, never an implicit check on access.

use crate::error::{Result, TabmergeError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for one table file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Field delimiter for the delimited text format.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Ordered key column names. Empty routes the file to whole-row
    /// add/delete-only comparison.
    #[serde(default)]
    pub key_columns: Vec<String>,

    /// Ordered coarser entity-identity columns used only for conflict
    /// detection. Empty means the key columns themselves.
    #[serde(default)]
    pub dup_key_columns: Vec<String>,

    /// Per-column chrono format overrides used to normalize date-valued key
    /// columns before they enter a composite key.
    #[serde(default)]
    pub date_formats: HashMap<String, String>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            key_columns: Vec::new(),
            dup_key_columns: Vec::new(),
            date_formats: HashMap::new(),
        }
    }
}

impl FileConfig {
    /// Delimiter as the single byte the csv reader/writer wants.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    /// Columns that define entity identity for conflict detection.
    pub fn entity_columns(&self) -> &[String] {
        if self.dup_key_columns.is_empty() {
            &self.key_columns
        } else {
            &self.dup_key_columns
        }
    }

    /// Date format override for a key column, matched case-insensitively.
    pub fn date_format_for(&self, column: &str) -> Option<&str> {
        self.date_formats
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, fmt)| fmt.as_str())
    }
}

/// Explicitly constructed provider of per-file configuration.
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    path: Option<PathBuf>,
    files: IndexMap<String, FileConfig>,
}

impl ConfigProvider {
    /// Load the JSON config document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let files = Self::read_file(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            files,
        })
    }

    /// Build a provider from an in-memory map. Used by tests and embedders.
    pub fn from_map(entries: IndexMap<String, FileConfig>) -> Self {
        let files = entries
            .into_iter()
            .map(|(name, cfg)| (name.to_lowercase(), cfg))
            .collect();
        Self { path: None, files }
    }

    /// Re-read the backing file. Explicit: the provider never reloads on its
    /// own, so consumers see one consistent view for the whole transaction.
    pub fn reload(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or_else(|| {
            TabmergeError::config("cannot reload a provider built from an in-memory map")
        })?;
        self.files = Self::read_file(&path)?;
        Ok(())
    }

    /// Look up the config entry for a file name, case-insensitively.
    pub fn get(&self, file_name: &str) -> Option<&FileConfig> {
        self.files.get(&file_name.to_lowercase())
    }

    fn read_file(path: &Path) -> Result<IndexMap<String, FileConfig>> {
        let content = fs::read_to_string(path).map_err(|e| {
            TabmergeError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let raw: IndexMap<String, FileConfig> = serde_json::from_str(&content)?;
        Ok(raw
            .into_iter()
            .map(|(name, cfg)| (name.to_lowercase(), cfg))
            .collect())
    }
}

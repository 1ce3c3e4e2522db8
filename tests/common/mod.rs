//! Common test utilities and helpers

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tabmerge::config::{ConfigProvider, FileConfig};
use tabmerge::loader::{Row, TableFormat};
use tempfile::TempDir;

/// Test fixture manager for creating temporary folder layouts
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Get the root path of the test fixture
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a subfolder under the fixture root
    pub fn mkdir(&self, name: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Write a pipe-delimited table file from row literals
    pub fn write_table(&self, rel: &str, rows: &[&[&str]]) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut content = String::new();
        for row in rows {
            content.push_str(&row.join("|"));
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write arbitrary line content
    pub fn write_lines(&self, rel: &str, lines: &[&str]) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Read a pipe-delimited table back into rows
    pub fn read_table(&self, rel: &str) -> Vec<Row> {
        let path = self.root().join(rel);
        TableFormat::Delimited { delimiter: b'|' }
            .load(&path)
            .unwrap()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipe-delimited file config with the given key and dup-key columns
pub fn pipe_config(key_columns: &[&str], dup_key_columns: &[&str]) -> FileConfig {
    FileConfig {
        delimiter: "|".to_string(),
        key_columns: key_columns.iter().map(|s| s.to_string()).collect(),
        dup_key_columns: dup_key_columns.iter().map(|s| s.to_string()).collect(),
        date_formats: Default::default(),
    }
}

/// In-memory config provider from (file name, config) pairs
pub fn provider(entries: Vec<(&str, FileConfig)>) -> ConfigProvider {
    let map: IndexMap<String, FileConfig> = entries
        .into_iter()
        .map(|(name, cfg)| (name.to_string(), cfg))
        .collect();
    ConfigProvider::from_map(map)
}

/// Rows as owned data for assertions
pub fn rows(data: &[&[&str]]) -> Vec<Row> {
    data.iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}

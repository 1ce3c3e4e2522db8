//! Keyed row diffing between two tables sharing a schema
//!
//! Each data row is reduced to a composite identity key built from the
//! configured key columns and a signature built from everything else. Equal
//! key plus equal signature means the row is unchanged; the remaining rows
//! classify as Added, Deleted or Modified. Key columns may sit at different
//! positions on the two sides; each side resolves them through its own header.

use crate::config::FileConfig;
use crate::error::{Result, TabmergeError};
use crate::keycmp::normalize_date_value;
use crate::loader::Row;
use serde::Serialize;
use std::collections::HashMap;

/// Joins key-column values into a composite key. Not expected in data.
pub const KEY_SEPARATOR: char = '\u{001F}';

/// Joins non-key values into a row signature.
pub const SIGNATURE_SEPARATOR: char = '\u{001E}';

/// One classified row: its composite key, the individual key part values, and
/// the row as seen on each side where present.
#[derive(Debug, Clone, Serialize)]
pub struct DiffEntry {
    pub key: String,
    pub key_parts: Vec<String>,
    pub left: Option<Row>,
    pub right: Option<Row>,
}

/// Outcome of diffing two tables.
#[derive(Debug, Default, Serialize)]
pub struct DiffResult {
    pub added: Vec<DiffEntry>,
    pub deleted: Vec<DiffEntry>,
    pub modified: Vec<DiffEntry>,
    /// Composite keys seen more than once on the left side.
    pub left_duplicates: Vec<String>,
    /// Composite keys seen more than once on the right side.
    pub right_duplicates: Vec<String>,
}

impl DiffResult {
    pub fn added_count(&self) -> usize {
        self.added.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }

    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    pub fn has_duplicates(&self) -> bool {
        !self.left_duplicates.is_empty() || !self.right_duplicates.is_empty()
    }

    /// Key parts of every changed row, across all three classifications.
    pub fn changed_key_parts(&self) -> impl Iterator<Item = &[String]> {
        self.added
            .iter()
            .chain(self.deleted.iter())
            .chain(self.modified.iter())
            .map(|e| e.key_parts.as_slice())
    }
}

/// Case-insensitive column name -> index map; first occurrence wins.
pub fn header_index_map(header: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::with_capacity(header.len());
    for (idx, name) in header.iter().enumerate() {
        map.entry(name.trim().to_lowercase()).or_insert(idx);
    }
    map
}

/// Resolve the configured key columns against one side's header.
pub fn resolve_key_indexes(
    index: &HashMap<String, usize>,
    key_columns: &[String],
) -> Result<Vec<usize>> {
    key_columns
        .iter()
        .map(|name| {
            index.get(&name.trim().to_lowercase()).copied().ok_or_else(|| {
                TabmergeError::diff(format!("key column '{}' not found in header", name))
            })
        })
        .collect()
}

/// Re-slice a row's key part values to the coarser entity-identity columns.
pub fn project_entity_key(
    key_parts: &[String],
    key_columns: &[String],
    entity_columns: &[String],
) -> String {
    let mut projected = Vec::with_capacity(entity_columns.len());
    for entity in entity_columns {
        let value = key_columns
            .iter()
            .position(|k| k.eq_ignore_ascii_case(entity))
            .and_then(|pos| key_parts.get(pos))
            .map(String::as_str)
            .unwrap_or("");
        projected.push(value);
    }
    projected.join(&KEY_SEPARATOR.to_string())
}

/// Render a composite key for human-readable reports.
pub fn display_key(key: &str) -> String {
    key.replace(KEY_SEPARATOR, "|")
}

/// Composite key -> row map over a table's data rows, first occurrence wins.
/// This is the working map the merge orchestrator applies a diff onto.
pub fn key_row_map(rows: &[Row], config: &FileConfig) -> Result<indexmap::IndexMap<String, Row>> {
    let mut map = indexmap::IndexMap::new();
    let Some((header, data)) = rows.split_first() else {
        return Ok(map);
    };
    let index = header_index_map(header);
    let key_indexes = resolve_key_indexes(&index, &config.key_columns)?;
    for row in data {
        let key = build_key_parts(row, &key_indexes, &config.key_columns, config)
            .join(&KEY_SEPARATOR.to_string());
        map.entry(key).or_insert_with(|| row.clone());
    }
    Ok(map)
}

/// Composite keys appearing more than once among a table's data rows.
pub fn duplicate_keys(rows: &[Row], config: &FileConfig) -> Result<Vec<String>> {
    let sig_width = rows.first().map(Vec::len).unwrap_or(0);
    Ok(build_side(rows, config, sig_width)?.duplicates)
}

struct SideEntry {
    key_parts: Vec<String>,
    signature: String,
    row: Row,
}

#[derive(Default)]
struct SideIndex {
    entries: HashMap<String, SideEntry>,
    duplicates: Vec<String>,
}

/// Diff two tables (row 0 = header on both sides) under one file config.
///
/// An empty key-column list falls back to whole-row add/delete comparison.
/// Empty inputs on either side produce a zero-row diff for that side.
pub fn diff_tables(left: &[Row], right: &[Row], config: &FileConfig) -> Result<DiffResult> {
    if config.key_columns.is_empty() {
        return Ok(diff_whole_rows(left, right));
    }

    let sig_width = left
        .first()
        .map(Vec::len)
        .unwrap_or(0)
        .max(right.first().map(Vec::len).unwrap_or(0));

    let left_index = build_side(left, config, sig_width)?;
    let right_index = build_side(right, config, sig_width)?;

    let mut result = DiffResult {
        left_duplicates: left_index.duplicates,
        right_duplicates: right_index.duplicates,
        ..DiffResult::default()
    };

    for (key, l) in &left_index.entries {
        match right_index.entries.get(key) {
            None => result.deleted.push(DiffEntry {
                key: key.clone(),
                key_parts: l.key_parts.clone(),
                left: Some(l.row.clone()),
                right: None,
            }),
            Some(r) if r.signature != l.signature => result.modified.push(DiffEntry {
                key: key.clone(),
                key_parts: l.key_parts.clone(),
                left: Some(l.row.clone()),
                right: Some(r.row.clone()),
            }),
            Some(_) => {}
        }
    }

    for (key, r) in &right_index.entries {
        if !left_index.entries.contains_key(key) {
            result.added.push(DiffEntry {
                key: key.clone(),
                key_parts: r.key_parts.clone(),
                left: None,
                right: Some(r.row.clone()),
            });
        }
    }

    Ok(result)
}

fn build_side(rows: &[Row], config: &FileConfig, sig_width: usize) -> Result<SideIndex> {
    let mut side = SideIndex::default();
    let Some((header, data)) = rows.split_first() else {
        return Ok(side);
    };

    let index = header_index_map(header);
    let key_indexes = resolve_key_indexes(&index, &config.key_columns)?;

    for row in data {
        let key_parts = build_key_parts(row, &key_indexes, &config.key_columns, config);
        let key = key_parts.join(&KEY_SEPARATOR.to_string());
        let signature = build_signature(row, &key_indexes, sig_width);

        if side.entries.contains_key(&key) {
            // First occurrence wins for comparison; the duplicate is recorded,
            // never silently dropped.
            side.duplicates.push(key);
            continue;
        }
        side.entries.insert(
            key,
            SideEntry {
                key_parts,
                signature,
                row: row.clone(),
            },
        );
    }
    Ok(side)
}

fn build_key_parts(
    row: &Row,
    key_indexes: &[usize],
    key_columns: &[String],
    config: &FileConfig,
) -> Vec<String> {
    key_indexes
        .iter()
        .zip(key_columns)
        .map(|(&idx, column)| {
            let value = row.get(idx).map(String::as_str).unwrap_or("").trim();
            match config.date_format_for(column) {
                Some(fmt) => normalize_date_value(value, fmt),
                None => value.to_string(),
            }
        })
        .collect()
}

fn build_signature(row: &Row, key_indexes: &[usize], sig_width: usize) -> String {
    let mut parts = Vec::with_capacity(sig_width.saturating_sub(key_indexes.len()));
    for idx in 0..sig_width {
        if key_indexes.contains(&idx) {
            continue;
        }
        parts.push(row.get(idx).map(String::as_str).unwrap_or("").trim());
    }
    parts.join(&SIGNATURE_SEPARATOR.to_string())
}

/// Whole-row set comparison for files with no key configuration. Modified is
/// always zero here.
fn diff_whole_rows(left: &[Row], right: &[Row]) -> DiffResult {
    let mut result = DiffResult::default();

    let index_rows = |rows: &[Row], duplicates: &mut Vec<String>| {
        let mut map: HashMap<String, Row> = HashMap::new();
        for row in rows.iter().skip(1) {
            let key = row.join(&KEY_SEPARATOR.to_string());
            if map.contains_key(&key) {
                duplicates.push(key);
            } else {
                map.insert(key, row.clone());
            }
        }
        map
    };

    let left_map = index_rows(left, &mut result.left_duplicates);
    let right_map = index_rows(right, &mut result.right_duplicates);

    for (key, row) in &left_map {
        if !right_map.contains_key(key) {
            result.deleted.push(DiffEntry {
                key: key.clone(),
                key_parts: row.clone(),
                left: Some(row.clone()),
                right: None,
            });
        }
    }
    for (key, row) in &right_map {
        if !left_map.contains_key(key) {
            result.added.push(DiffEntry {
                key: key.clone(),
                key_parts: row.clone(),
                left: None,
                right: Some(row.clone()),
            });
        }
    }
    result
}

//! Table loaders and writers
//!
//! The engine is format-agnostic: a loader turns a path into an ordered row
//! sequence with row 0 conventionally the header, and a matching writer
//! persists the merged result. Two concrete formats back the contract: a
//! delimited text format and a structured binary format with paired header
//! metadata.

use crate::config::FileConfig;
use crate::error::{Result, TabmergeError};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A table row, positionally aligned to the header row.
pub type Row = Vec<String>;

/// Magic prefix of the binary row format.
const BINARY_MAGIC: &[u8; 4] = b"TMB1";

/// Extension that selects the binary format.
const BINARY_EXTENSION: &str = "tbl";

/// How a table file is read and written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Delimited { delimiter: u8 },
    Binary,
}

impl TableFormat {
    /// Pick the format for a path, honoring the file's config delimiter.
    pub fn detect(path: &Path, config: Option<&FileConfig>) -> Self {
        let is_binary = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(BINARY_EXTENSION))
            .unwrap_or(false);
        if is_binary {
            TableFormat::Binary
        } else {
            TableFormat::Delimited {
                delimiter: config.map(|c| c.delimiter_byte()).unwrap_or(b','),
            }
        }
    }

    /// Load the full table, header row included.
    pub fn load(&self, path: &Path) -> Result<Vec<Row>> {
        match self {
            TableFormat::Delimited { delimiter } => load_delimited(path, *delimiter),
            TableFormat::Binary => load_binary(path),
        }
    }

    /// Persist the full table, header row included.
    pub fn write(&self, path: &Path, rows: &[Row]) -> Result<()> {
        match self {
            TableFormat::Delimited { delimiter } => write_delimited(path, *delimiter, rows),
            TableFormat::Binary => write_binary(path, rows),
        }
    }
}

fn load_delimited(path: &Path, delimiter: u8) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

fn write_delimited(path: &Path, delimiter: u8, rows: &[Row]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn header_path(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".hdr");
    os.into()
}

/// Binary rows with the header row in a paired `.hdr` metadata file.
///
/// Layout: magic, u32 row count, then per row a u32 field count followed by
/// length-prefixed UTF-8 fields. All integers little-endian.
fn load_binary(path: &Path) -> Result<Vec<Row>> {
    let header_file = header_path(path);
    let header_json = fs::read_to_string(&header_file).map_err(|e| {
        TabmergeError::table_load(path, format!("missing header metadata {}: {}", header_file.display(), e))
    })?;
    let header: Row = serde_json::from_str(&header_json)?;

    let mut reader = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != BINARY_MAGIC {
        return Err(TabmergeError::table_load(path, "bad magic, not a binary table"));
    }

    let row_count = read_u32(&mut reader, path)? as usize;
    let mut rows = Vec::with_capacity(row_count + 1);
    rows.push(header);

    for _ in 0..row_count {
        let field_count = read_u32(&mut reader, path)? as usize;
        let mut row = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let len = read_u32(&mut reader, path)? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            let field = String::from_utf8(buf)
                .map_err(|e| TabmergeError::table_load(path, format!("invalid UTF-8 field: {}", e)))?;
            row.push(field);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn write_binary(path: &Path, rows: &[Row]) -> Result<()> {
    let (header, data) = match rows.split_first() {
        Some((header, data)) => (header.clone(), data),
        None => (Row::new(), &[] as &[Row]),
    };

    fs::write(header_path(path), serde_json::to_string(&header)?)?;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(BINARY_MAGIC)?;
    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    for row in data {
        writer.write_all(&(row.len() as u32).to_le_bytes())?;
        for field in row {
            writer.write_all(&(field.len() as u32).to_le_bytes())?;
            writer.write_all(field.as_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_u32(reader: &mut impl Read, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|_| TabmergeError::table_load(path, "truncated binary table"))?;
    Ok(u32::from_le_bytes(buf))
}

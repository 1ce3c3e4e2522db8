//! Set-based line coverage comparison
//!
//! Answers "which lines of side 1 are present anywhere in side 2" for
//! file-to-file, file-to-folder and folder-to-folder inputs. The side-2
//! unique-line set is built fully in memory; each side-1 file is then checked
//! for membership. Above [`crate::DEFAULT_OPTIMIZE_THRESHOLD`] unique lines an
//! optimized mode removes each matched line right after matching, shrinking
//! lookup cost for the rest of the scan. Both phases fan out across files
//! with rayon.

use crate::cancel::CancellationToken;
use crate::error::Result;
use glob_match::glob_match;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// Options for one coverage run.
#[derive(Debug, Clone)]
pub struct LineSetOptions {
    /// Literal marker: content at and after its first occurrence, plus
    /// trailing whitespace, is dropped before comparison.
    pub truncate_marker: Option<String>,
    /// File-name pattern applied when a side is a folder.
    pub pattern: Option<String>,
    /// Recurse into subfolders when a side is a folder.
    pub recursive: bool,
    /// Unique-line count above which the shrinking-set mode kicks in.
    pub optimize_threshold: usize,
    /// Files larger than this are read incrementally instead of in one buffer.
    pub large_file_bytes: u64,
}

impl Default for LineSetOptions {
    fn default() -> Self {
        Self {
            truncate_marker: None,
            pattern: None,
            recursive: false,
            optimize_threshold: crate::DEFAULT_OPTIMIZE_THRESHOLD,
            large_file_bytes: crate::DEFAULT_LARGE_FILE_BYTES,
        }
    }
}

/// Per-file line counts for one side-1 file.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileCoverage {
    pub path: PathBuf,
    pub total: u64,
    pub matched: u64,
    pub missing: u64,
}

/// Result of one coverage run.
#[derive(Debug, Default, serde::Serialize)]
pub struct CoverageReport {
    /// One entry per successfully scanned side-1 file.
    pub files: Vec<FileCoverage>,
    /// Missing line content -> the side-1 files it appeared in.
    pub missing_lines: HashMap<String, Vec<PathBuf>>,
    /// Unique side-2 lines collected before scanning.
    pub reference_lines: usize,
}

impl CoverageReport {
    pub fn total_missing(&self) -> u64 {
        self.files.iter().map(|f| f.missing).sum()
    }
}

/// Side-2 set in one of its two lookup modes. In shrinking mode the
/// lookup+removal is one atomic step behind a single coarse lock.
enum ReferenceSet {
    Frozen(HashSet<String>),
    Shrinking(Mutex<HashSet<String>>),
}

impl ReferenceSet {
    fn matches(&self, line: &str) -> bool {
        match self {
            ReferenceSet::Frozen(set) => set.contains(line),
            ReferenceSet::Shrinking(shared) => shared
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(line),
        }
    }
}

pub struct LineSetComparator {
    options: LineSetOptions,
    cancel: CancellationToken,
}

impl LineSetComparator {
    pub fn new(options: LineSetOptions, cancel: CancellationToken) -> Self {
        Self { options, cancel }
    }

    /// Compare side 1 against side 2; either side may be a file or a folder.
    pub fn compare(&self, side1: &Path, side2: &Path) -> Result<CoverageReport> {
        let side2_files = self.collect_files(side2)?;
        let reference = self.collect_reference_set(&side2_files)?;
        let reference_lines = reference.len();
        log::info!(
            "collected {} unique reference lines from {} file(s)",
            reference_lines,
            side2_files.len()
        );

        let reference = if reference_lines > self.options.optimize_threshold {
            log::info!("reference set above threshold, enabling shrinking-set mode");
            ReferenceSet::Shrinking(Mutex::new(reference))
        } else {
            ReferenceSet::Frozen(reference)
        };

        let side1_files = self.collect_files(side1)?;
        let missing_map: Mutex<HashMap<String, Vec<PathBuf>>> = Mutex::new(HashMap::new());

        let coverages: Vec<Option<FileCoverage>> = side1_files
            .par_iter()
            .map(|path| self.scan_file(path, &reference, &missing_map))
            .collect::<Result<Vec<_>>>()?;

        Ok(CoverageReport {
            files: coverages.into_iter().flatten().collect(),
            missing_lines: missing_map.into_inner().unwrap_or_else(|p| p.into_inner()),
            reference_lines,
        })
    }

    /// Resolve a side to its file list, honoring pattern and recursion.
    fn collect_files(&self, side: &Path) -> Result<Vec<PathBuf>> {
        if side.is_file() {
            return Ok(vec![side.to_path_buf()]);
        }

        let max_depth = if self.options.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(side).max_depth(max_depth) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(pattern) = &self.options.pattern {
                let name = entry.file_name().to_string_lossy();
                if !glob_match(pattern, &name) {
                    continue;
                }
            }
            files.push(entry.into_path());
        }
        files.sort();
        Ok(files)
    }

    /// Phase 1: union of unique lines across all side-2 files, in parallel.
    fn collect_reference_set(&self, files: &[PathBuf]) -> Result<HashSet<String>> {
        let per_file: Vec<HashSet<String>> = files
            .par_iter()
            .map(|path| {
                let mut set = HashSet::new();
                self.for_each_line(path, |line| {
                    set.insert(line);
                })?;
                Ok(set)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut union: HashSet<String> = HashSet::new();
        for set in per_file {
            if union.is_empty() {
                union = set;
            } else {
                union.extend(set);
            }
        }
        Ok(union)
    }

    /// Phase 2: membership scan of one side-1 file. Missing lines are
    /// buffered locally and published under one lock at the end of the file.
    fn scan_file(
        &self,
        path: &Path,
        reference: &ReferenceSet,
        missing_map: &Mutex<HashMap<String, Vec<PathBuf>>>,
    ) -> Result<Option<FileCoverage>> {
        let mut matched = 0u64;
        let mut missing = 0u64;
        let mut missing_lines: Vec<String> = Vec::new();

        let total = self.for_each_line(path, |line| {
            if reference.matches(&line) {
                matched += 1;
            } else {
                missing += 1;
                missing_lines.push(line);
            }
        })?;

        let Some(total) = total else {
            return Ok(None);
        };

        if !missing_lines.is_empty() {
            let mut map = missing_map
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for line in missing_lines {
                map.entry(line).or_default().push(path.to_path_buf());
            }
        }

        Ok(Some(FileCoverage {
            path: path.to_path_buf(),
            total,
            matched,
            missing,
        }))
    }

    /// Stream a file's cleaned lines through `visit`.
    ///
    /// Returns the line count, or `None` when the file could not be read --
    /// the failure is swallowed and the run continues without it. Large files
    /// are read incrementally; cancellation is observed per file and every
    /// [`crate::LINES_PER_CANCEL_CHECK`] lines, never mid-line.
    fn for_each_line(
        &self,
        path: &Path,
        mut visit: impl FnMut(String),
    ) -> Result<Option<u64>> {
        self.cancel.check()?;

        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("skipping unreadable file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        let mut count = 0u64;
        if size > self.options.large_file_bytes {
            let file = match File::open(path) {
                Ok(f) => f,
                Err(e) => {
                    log::warn!("skipping unreadable file {}: {}", path.display(), e);
                    return Ok(None);
                }
            };
            for line in BufReader::new(file).lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        log::warn!("skipping file {} mid-read: {}", path.display(), e);
                        return Ok(None);
                    }
                };
                count += 1;
                if count % crate::LINES_PER_CANCEL_CHECK == 0 {
                    self.cancel.check()?;
                }
                visit(self.clean_line(&line));
            }
        } else {
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("skipping unreadable file {}: {}", path.display(), e);
                    return Ok(None);
                }
            };
            for line in content.lines() {
                count += 1;
                if count % crate::LINES_PER_CANCEL_CHECK == 0 {
                    self.cancel.check()?;
                }
                visit(self.clean_line(line));
            }
        }
        Ok(Some(count))
    }

    /// Apply the truncation rule: cut at the marker's first occurrence, then
    /// drop trailing whitespace.
    fn clean_line(&self, raw: &str) -> String {
        let cut = match &self.options.truncate_marker {
            Some(marker) => match raw.find(marker.as_str()) {
                Some(pos) => &raw[..pos],
                None => raw,
            },
            None => raw,
        };
        cut.trim_end().to_string()
    }
}

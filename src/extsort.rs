//! Disk-backed comparison of very large line files
//!
//! Neither input is ever held fully in memory. Each file is streamed into
//! fixed-size chunks, each chunk sorted in memory and flushed to a scratch
//! file, then the chunk files are pairwise merged until one fully sorted file
//! per side remains. A final merge-join walks both sorted files in lockstep
//! producing exact common/only-left/only-right counts plus a bounded number
//! of sample lines per category. Repeated identical lines within one file are
//! counted individually, unlike a set-based comparison.

use crate::cancel::CancellationToken;
use crate::error::{Result, TabmergeError};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Options for one large comparison run.
#[derive(Debug, Clone)]
pub struct ExternalSortOptions {
    /// Lines per in-memory chunk during the sort phase.
    pub chunk_lines: usize,
    /// Samples retained per result category.
    pub sample_limit: usize,
}

impl Default for ExternalSortOptions {
    fn default() -> Self {
        Self {
            chunk_lines: crate::DEFAULT_CHUNK_LINES,
            sample_limit: crate::DEFAULT_SAMPLE_LIMIT,
        }
    }
}

/// Exact counts plus bounded samples from a merge-join.
#[derive(Debug, Default, serde::Serialize)]
pub struct LargeCompareResult {
    pub common: u64,
    pub only_left: u64,
    pub only_right: u64,
    pub common_samples: Vec<String>,
    pub only_left_samples: Vec<String>,
    pub only_right_samples: Vec<String>,
}

/// Per-invocation scratch directory, removed when the run finishes.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("tabmerge-sort-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Streaming cursor over one line file.
struct LineCursor {
    reader: BufReader<File>,
    current: Option<String>,
}

impl LineCursor {
    fn open(path: &Path) -> Result<Self> {
        let mut cursor = Self {
            reader: BufReader::new(File::open(path)?),
            current: None,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    fn advance(&mut self) -> Result<()> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;
        self.current = if read == 0 {
            None
        } else {
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            Some(line)
        };
        Ok(())
    }
}

/// Stream-merge two sorted line files into one, parameterized by ordering.
///
/// The pairwise queue in [`ExternalSortComparator::sort_file`] is built on
/// this; any future row-level large-file comparator can reuse it with its own
/// key-extracting comparator.
pub fn merge_sorted_files<F>(a: &Path, b: &Path, out: &Path, mut compare: F) -> Result<()>
where
    F: FnMut(&str, &str) -> Ordering,
{
    let mut left = LineCursor::open(a)?;
    let mut right = LineCursor::open(b)?;
    let mut writer = BufWriter::new(File::create(out)?);

    loop {
        let take_left = match (left.current.as_deref(), right.current.as_deref()) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(x), Some(y)) => compare(x, y) != Ordering::Greater,
        };
        if take_left {
            if let Some(line) = &left.current {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            left.advance()?;
        } else {
            if let Some(line) = &right.current {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            right.advance()?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub struct ExternalSortComparator {
    options: ExternalSortOptions,
    cancel: CancellationToken,
}

impl ExternalSortComparator {
    pub fn new(options: ExternalSortOptions, cancel: CancellationToken) -> Self {
        Self { options, cancel }
    }

    /// Compare two arbitrarily large line files.
    pub fn compare(&self, left: &Path, right: &Path) -> Result<LargeCompareResult> {
        let scratch = ScratchDir::create()?;
        log::debug!("external sort scratch dir: {}", scratch.path().display());

        let left_sorted = self.sort_file(left, scratch.path(), "left")?;
        let right_sorted = self.sort_file(right, scratch.path(), "right")?;
        self.merge_join(&left_sorted, &right_sorted)
    }

    /// Phase 1 and 2: chunk-sort a file, then pairwise-merge the chunk files
    /// until a single fully sorted file remains. Consumed intermediates are
    /// deleted eagerly.
    fn sort_file(&self, input: &Path, scratch: &Path, tag: &str) -> Result<PathBuf> {
        let mut chunks: VecDeque<PathBuf> = VecDeque::new();
        let mut buffer: Vec<String> = Vec::with_capacity(self.options.chunk_lines.min(1 << 16));
        let mut sequence = 0usize;

        let reader = BufReader::new(File::open(input)?);
        for line in reader.lines() {
            buffer.push(line?);
            if buffer.len() >= self.options.chunk_lines {
                self.cancel.check()?;
                chunks.push_back(self.flush_chunk(&mut buffer, scratch, tag, sequence)?);
                sequence += 1;
            }
        }
        if !buffer.is_empty() {
            chunks.push_back(self.flush_chunk(&mut buffer, scratch, tag, sequence)?);
            sequence += 1;
        }
        if chunks.is_empty() {
            // Empty input still needs a (sorted, empty) file for the join.
            let empty = scratch.join(format!("{}-empty.sorted", tag));
            File::create(&empty)?;
            return Ok(empty);
        }

        while chunks.len() > 1 {
            self.cancel.check()?;
            let a = pop_chunk(&mut chunks)?;
            let b = pop_chunk(&mut chunks)?;
            let merged = scratch.join(format!("{}-merge-{:04}.sorted", tag, sequence));
            sequence += 1;
            merge_sorted_files(&a, &b, &merged, str::cmp)?;
            fs::remove_file(&a)?;
            fs::remove_file(&b)?;
            chunks.push_back(merged);
        }
        pop_chunk(&mut chunks)
    }

    fn flush_chunk(
        &self,
        buffer: &mut Vec<String>,
        scratch: &Path,
        tag: &str,
        sequence: usize,
    ) -> Result<PathBuf> {
        buffer.sort_unstable();
        let path = scratch.join(format!("{}-chunk-{:04}.sorted", tag, sequence));
        let mut writer = BufWriter::new(File::create(&path)?);
        for line in buffer.iter() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        buffer.clear();
        Ok(path)
    }

    /// Phase 3: lockstep merge-join over the two fully sorted files.
    fn merge_join(&self, left: &Path, right: &Path) -> Result<LargeCompareResult> {
        #[derive(Clone, Copy)]
        enum Step {
            Common,
            OnlyLeft,
            OnlyRight,
        }

        let mut a = LineCursor::open(left)?;
        let mut b = LineCursor::open(right)?;
        let mut result = LargeCompareResult::default();
        let mut processed = 0u64;

        loop {
            processed += 1;
            if processed % crate::LINES_PER_CANCEL_CHECK == 0 {
                self.cancel.check()?;
            }

            let step = match (a.current.as_deref(), b.current.as_deref()) {
                (None, None) => break,
                (Some(_), None) => Step::OnlyLeft,
                (None, Some(_)) => Step::OnlyRight,
                (Some(x), Some(y)) => match x.cmp(y) {
                    Ordering::Equal => Step::Common,
                    Ordering::Less => Step::OnlyLeft,
                    Ordering::Greater => Step::OnlyRight,
                },
            };

            match step {
                Step::Common => {
                    result.common += 1;
                    self.take_sample(&mut result.common_samples, a.current.as_deref());
                    a.advance()?;
                    b.advance()?;
                }
                Step::OnlyLeft => {
                    result.only_left += 1;
                    self.take_sample(&mut result.only_left_samples, a.current.as_deref());
                    a.advance()?;
                }
                Step::OnlyRight => {
                    result.only_right += 1;
                    self.take_sample(&mut result.only_right_samples, b.current.as_deref());
                    b.advance()?;
                }
            }
        }
        Ok(result)
    }

    fn take_sample(&self, samples: &mut Vec<String>, line: Option<&str>) {
        if samples.len() < self.options.sample_limit {
            if let Some(line) = line {
                samples.push(line.to_string());
            }
        }
    }
}

fn pop_chunk(chunks: &mut VecDeque<PathBuf>) -> Result<PathBuf> {
    chunks
        .pop_front()
        .ok_or_else(|| TabmergeError::invalid_input("chunk queue unexpectedly empty"))
}

//! # tabmerge
//!
//! A tabular-data comparison and transactional merge engine: set-based line
//! coverage, disk-backed comparison of files too large for memory, keyed
//! row-level diffing, and a multi-user merge that detects concurrent edits to
//! the same logical entity and applies changes under backup/rollback.

pub mod cancel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod differ;
pub mod error;
pub mod extsort;
pub mod keycmp;
pub mod lineset;
pub mod loader;
pub mod merge;
pub mod output;
pub mod progress;

pub use cancel::CancellationToken;
pub use config::{ConfigProvider, FileConfig};
pub use error::{Result, TabmergeError};
pub use merge::{MergeEngine, MergeOutcome, MergeRequest};

/// Unique reference-line count above which the Line-Set Comparator switches
/// to its shrinking-set mode.
pub const DEFAULT_OPTIMIZE_THRESHOLD: usize = 1_000_000;

/// File size above which line scanning reads incrementally rather than
/// buffering the whole file.
pub const DEFAULT_LARGE_FILE_BYTES: u64 = 64 * 1024 * 1024;

/// Lines between cooperative cancellation checks while streaming a file.
pub const LINES_PER_CANCEL_CHECK: u64 = 50_000;

/// Lines per in-memory chunk in the external sort.
pub const DEFAULT_CHUNK_LINES: usize = 100_000;

/// Sample lines retained per category by the external comparator.
pub const DEFAULT_SAMPLE_LIMIT: usize = 2_000;

/// Conflicting entities named in one conflict report.
pub const CONFLICT_REPORT_LIMIT: usize = 10;

/// Duplicate-key findings named in one pre-flight report.
pub const DUPLICATE_REPORT_LIMIT: usize = 50;

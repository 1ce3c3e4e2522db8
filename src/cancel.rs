//! Cooperative cancellation for long-running operations
//!
//! A single token is threaded through every comparator and through the merge
//! orchestrator. Observers check it at file and chunk/line boundaries, never
//! mid-line, so output files are always left at a record boundary.

use crate::error::{Result, TabmergeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All holders of this token observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bail out with `TabmergeError::Cancelled` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TabmergeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

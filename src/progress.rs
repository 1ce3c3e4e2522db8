//! Progress reporting utilities
//!
//! The engine reports progress through the [`ProgressSink`] trait so that a
//! no-op implementation can stand in when nobody is observing. The CLI wires
//! in an indicatif-backed console sink.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Observer for long-running operations.
///
/// `percent` is monotonic within one operation, 0-100. `step`/`total` carry the
/// current item count of whatever phase the message describes.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str, percent: u8, step: u64, total: u64);
}

/// Sink that discards every report.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _message: &str, _percent: u8, _step: u64, _total: u64) {}
}

/// Console sink backed by a single 0-100 progress bar.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .expect("Invalid progress template")
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, message: &str, percent: u8, step: u64, total: u64) {
        self.bar.set_position(percent.min(100) as u64);
        if total > 0 {
            self.bar.set_message(format!("{} ({}/{})", message, step, total));
        } else {
            self.bar.set_message(message.to_string());
        }
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// One contiguous percent window of a multi-phase operation.
///
/// The merge transaction spans precheck 0-40, backup 40-55, merge 55-95 and
/// cleanup 95-100; each window apportions its share by completed item count.
#[derive(Debug, Clone, Copy)]
pub struct PhaseWindow {
    pub start: u8,
    pub end: u8,
}

impl PhaseWindow {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Percent after `done` of `total` items of this phase have completed.
    pub fn at(&self, done: u64, total: u64) -> u8 {
        if total == 0 {
            return self.end;
        }
        let span = (self.end - self.start) as u64;
        let done = done.min(total);
        self.start + (span * done / total) as u8
    }
}

/// Phase windows of a merge transaction.
pub const PHASE_PRECHECK: PhaseWindow = PhaseWindow::new(0, 40);
pub const PHASE_BACKUP: PhaseWindow = PhaseWindow::new(40, 55);
pub const PHASE_MERGE: PhaseWindow = PhaseWindow::new(55, 95);
pub const PHASE_CLEANUP: PhaseWindow = PhaseWindow::new(95, 100);

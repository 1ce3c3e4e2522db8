//! Output formatting utilities

use crate::differ::{display_key, DiffResult};
use crate::extsort::LargeCompareResult;
use crate::lineset::CoverageReport;
use crate::merge::MergeOutcome;

/// Keys listed per classification before truncating.
const KEYS_SHOWN: usize = 10;

/// Pretty printer for tabmerge output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print a line-coverage report
    pub fn print_coverage(report: &CoverageReport) {
        println!(
            "📊 Coverage against {} unique reference line(s)",
            report.reference_lines
        );
        if report.files.is_empty() {
            println!("No files scanned.");
            return;
        }
        for (i, file) in report.files.iter().enumerate() {
            let prefix = if i == report.files.len() - 1 { "└─" } else { "├─" };
            let pct = if file.total > 0 {
                file.matched as f64 * 100.0 / file.total as f64
            } else {
                100.0
            };
            println!(
                "{} {}: {}/{} matched ({:.1}%), {} missing",
                prefix,
                file.path.display(),
                file.matched,
                file.total,
                pct,
                file.missing
            );
        }
        if !report.missing_lines.is_empty() {
            println!("Missing lines: {}", report.missing_lines.len());
        }
    }

    /// Print an external sort-merge comparison result
    pub fn print_large_compare(result: &LargeCompareResult) {
        println!("📊 Large file comparison");
        println!("├─ Common lines: {}", result.common);
        println!("├─ Only in left: {}", result.only_left);
        println!("└─ Only in right: {}", result.only_right);

        Self::print_samples("left-only", &result.only_left_samples);
        Self::print_samples("right-only", &result.only_right_samples);
    }

    fn print_samples(label: &str, samples: &[String]) {
        if samples.is_empty() {
            return;
        }
        println!("{} samples (first {}):", label, samples.len().min(KEYS_SHOWN));
        for sample in samples.iter().take(KEYS_SHOWN) {
            println!("  {}", sample);
        }
    }

    /// Print a keyed row diff
    pub fn print_diff(result: &DiffResult) {
        println!("📊 Keyed row diff");
        println!("├─ Added: {}", result.added_count());
        println!("├─ Deleted: {}", result.deleted_count());
        println!("└─ Modified: {}", result.modified_count());

        Self::print_keys("Added", result.added.iter().map(|e| e.key.as_str()));
        Self::print_keys("Deleted", result.deleted.iter().map(|e| e.key.as_str()));
        Self::print_keys("Modified", result.modified.iter().map(|e| e.key.as_str()));

        if !result.left_duplicates.is_empty() {
            println!(
                "⚠️  {} duplicate key(s) on the left side",
                result.left_duplicates.len()
            );
        }
        if !result.right_duplicates.is_empty() {
            println!(
                "⚠️  {} duplicate key(s) on the right side",
                result.right_duplicates.len()
            );
        }
    }

    fn print_keys<'a>(label: &str, keys: impl Iterator<Item = &'a str>) {
        let keys: Vec<&str> = keys.collect();
        if keys.is_empty() {
            return;
        }
        let shown: Vec<String> = keys.iter().take(KEYS_SHOWN).map(|k| display_key(k)).collect();
        let suffix = if keys.len() > KEYS_SHOWN {
            format!(" ... and {} more", keys.len() - KEYS_SHOWN)
        } else {
            String::new()
        };
        println!("{}: {}{}", label, shown.join(", "), suffix);
    }

    /// Print a merge transaction outcome
    pub fn print_merge_outcome(outcome: &MergeOutcome) {
        match outcome {
            MergeOutcome::Success => println!("✅ Merge completed successfully"),
            MergeOutcome::Warning(msg) => println!("⚠️  Merge blocked: {}", msg),
            MergeOutcome::Failure(msg) => println!("❌ Merge failed: {}", msg),
        }
    }
}

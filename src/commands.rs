//! Command implementations for the tabmerge CLI

use crate::cancel::CancellationToken;
use crate::cli::Commands;
use crate::config::{ConfigProvider, FileConfig};
use crate::differ::diff_tables;
use crate::error::Result;
use crate::extsort::{ExternalSortComparator, ExternalSortOptions};
use crate::lineset::{LineSetComparator, LineSetOptions};
use crate::loader::TableFormat;
use crate::merge::{MergeEngine, MergeRequest};
use crate::output::PrettyPrinter;
use crate::progress::{ConsoleProgress, NoopProgress, ProgressSink};
use std::path::{Path, PathBuf};

/// Execute a command
pub fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Coverage {
            side1,
            side2,
            pattern,
            recursive,
            truncate_at,
            optimize_threshold,
            json,
        } => coverage_command(
            &side1,
            &side2,
            pattern,
            recursive,
            truncate_at,
            optimize_threshold,
            json,
        ),
        Commands::CompareLarge {
            left,
            right,
            chunk_lines,
            samples,
            json,
        } => compare_large_command(&left, &right, chunk_lines, samples, json),
        Commands::Diff {
            left,
            right,
            config,
            file_name,
            json,
        } => diff_command(&left, &right, &config, file_name, json),
        Commands::Merge {
            baseline,
            target,
            config,
            no_precheck,
            quiet,
            user_dirs,
        } => merge_command(&baseline, &target, &config, no_precheck, quiet, user_dirs),
    }
}

fn coverage_command(
    side1: &Path,
    side2: &Path,
    pattern: Option<String>,
    recursive: bool,
    truncate_at: Option<String>,
    optimize_threshold: usize,
    json: bool,
) -> Result<()> {
    let options = LineSetOptions {
        truncate_marker: truncate_at,
        pattern,
        recursive,
        optimize_threshold,
        ..LineSetOptions::default()
    };
    let comparator = LineSetComparator::new(options, CancellationToken::new());
    let report = comparator.compare(side1, side2)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        PrettyPrinter::print_coverage(&report);
    }
    Ok(())
}

fn compare_large_command(
    left: &Path,
    right: &Path,
    chunk_lines: usize,
    samples: usize,
    json: bool,
) -> Result<()> {
    let options = ExternalSortOptions {
        chunk_lines,
        sample_limit: samples,
    };
    let comparator = ExternalSortComparator::new(options, CancellationToken::new());
    let result = comparator.compare(left, right)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        PrettyPrinter::print_large_compare(&result);
    }
    Ok(())
}

fn diff_command(
    left: &Path,
    right: &Path,
    config_path: &Path,
    file_name: Option<String>,
    json: bool,
) -> Result<()> {
    let provider = ConfigProvider::load(config_path)?;
    let name = file_name.unwrap_or_else(|| {
        left.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    // No entry, or zero key columns, falls back to whole-row comparison.
    let file_config = provider.get(&name).cloned().unwrap_or_else(|| {
        log::warn!("no file config for {}, using whole-row comparison", name);
        FileConfig::default()
    });

    let left_rows = TableFormat::detect(left, Some(&file_config)).load(left)?;
    let right_rows = TableFormat::detect(right, Some(&file_config)).load(right)?;
    let result = diff_tables(&left_rows, &right_rows, &file_config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        PrettyPrinter::print_diff(&result);
    }
    Ok(())
}

fn merge_command(
    baseline: &Path,
    target: &Path,
    config_path: &Path,
    no_precheck: bool,
    quiet: bool,
    user_dirs: Vec<PathBuf>,
) -> Result<()> {
    let provider = ConfigProvider::load(config_path)?;
    let request = MergeRequest {
        baseline_dir: baseline.to_path_buf(),
        user_dirs,
        target_dir: target.to_path_buf(),
        precheck_duplicates: !no_precheck,
    };

    let progress: Box<dyn ProgressSink> = if quiet {
        Box::new(NoopProgress)
    } else {
        Box::new(ConsoleProgress::new())
    };
    let outcome =
        MergeEngine::new(&provider, progress.as_ref(), CancellationToken::new()).run(&request);
    drop(progress);

    PrettyPrinter::print_merge_outcome(&outcome);
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

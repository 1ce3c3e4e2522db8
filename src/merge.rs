//! Conflict detection and transactional multi-user merge
//!
//! Reconciles edits from many user folders against one baseline into a shared
//! target copy. Row-level changes are projected onto a coarser entity
//! identity (the dup-key columns); two actors touching the same entity abort
//! the whole transaction. Every target file is backed up before its first
//! mutation, and any failure or cancellation restores every backup so the
//! target folder is left byte-identical to its pre-transaction state.

use crate::cancel::CancellationToken;
use crate::config::{ConfigProvider, FileConfig};
use crate::differ::{
    diff_tables, display_key, duplicate_keys, header_index_map, key_row_map,
    project_entity_key, resolve_key_indexes,
};
use crate::error::{Result, TabmergeError};
use crate::keycmp::compare_rows_by_key;
use crate::loader::{Row, TableFormat};
use crate::progress::{
    ProgressSink, PHASE_BACKUP, PHASE_CLEANUP, PHASE_MERGE, PHASE_PRECHECK,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Final outcome of one merge transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Success,
    /// Cleanly detected blocking condition: duplicate keys, no eligible
    /// files, or an entity-level conflict. Nothing was left mutated.
    Warning(String),
    /// Exceptional condition; backups were restored best-effort.
    Failure(String),
}

impl MergeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MergeOutcome::Success)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            MergeOutcome::Success => None,
            MergeOutcome::Warning(msg) | MergeOutcome::Failure(msg) => Some(msg),
        }
    }
}

/// Inputs of one merge transaction.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub baseline_dir: PathBuf,
    pub user_dirs: Vec<PathBuf>,
    pub target_dir: PathBuf,
    /// Scan every (user, file) pair for internal duplicate keys and abort
    /// before any mutation if found.
    pub precheck_duplicates: bool,
}

/// A baseline file that will take part in the merge.
struct EligibleFile {
    name: String,
    config: FileConfig,
    /// User folders that carry an edited copy of this file.
    users: Vec<PathBuf>,
}

/// Ephemeral per-transaction backup state. Backups live in a uuid-named
/// directory and every backup exists before its target file is mutated.
struct MergeTransaction {
    backup_dir: PathBuf,
    /// target path -> backup path, in backup order.
    backups: Vec<(PathBuf, PathBuf)>,
}

impl MergeTransaction {
    fn begin() -> Result<Self> {
        let backup_dir = std::env::temp_dir().join(format!("tabmerge-tx-{}", Uuid::new_v4()));
        fs::create_dir_all(&backup_dir)?;
        Ok(Self {
            backup_dir,
            backups: Vec::new(),
        })
    }

    /// Copy one target file (and its paired header metadata, if any) aside.
    fn backup(&mut self, target: &Path) -> Result<()> {
        let mut candidates = vec![target.to_path_buf()];
        let mut header = target.as_os_str().to_os_string();
        header.push(".hdr");
        let header: PathBuf = header.into();
        if header.is_file() {
            candidates.push(header);
        }

        for source in candidates {
            let name = source.file_name().ok_or_else(|| {
                TabmergeError::merge(format!("cannot back up {}", source.display()))
            })?;
            let backup = self.backup_dir.join(name);
            fs::copy(&source, &backup)?;
            self.backups.push((source, backup));
        }
        Ok(())
    }

    /// Restore every backup. Best-effort: one failed restore is logged and
    /// does not stop the rest.
    fn rollback(&self) {
        for (target, backup) in &self.backups {
            match fs::copy(backup, target) {
                Ok(_) => log::info!("restored {}", target.display()),
                Err(e) => log::error!(
                    "failed to restore {} from {}: {}",
                    target.display(),
                    backup.display(),
                    e
                ),
            }
        }
    }

    fn discard(&self) {
        let _ = fs::remove_dir_all(&self.backup_dir);
    }
}

/// Bounded human-readable report: first `limit` items plus a count suffix.
pub fn bounded_report(items: &[String], limit: usize) -> String {
    let mut text = items
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("; ");
    if items.len() > limit {
        text.push_str(&format!(" ... and {} more", items.len() - limit));
    }
    text
}

pub struct MergeEngine<'a> {
    config: &'a ConfigProvider,
    progress: &'a dyn ProgressSink,
    cancel: CancellationToken,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        config: &'a ConfigProvider,
        progress: &'a dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            progress,
            cancel,
        }
    }

    /// Run one transaction: all-or-nothing over every eligible file.
    pub fn run(&self, request: &MergeRequest) -> MergeOutcome {
        let mut tx = match MergeTransaction::begin() {
            Ok(tx) => tx,
            Err(e) => return MergeOutcome::Failure(e.to_string()),
        };

        let outcome = match self.execute(request, &mut tx) {
            Ok(MergeOutcome::Success) => {
                self.delete_backups(&tx);
                MergeOutcome::Success
            }
            Ok(blocked) => {
                // A blocking condition found after files were already
                // touched takes the same restore path as a failure.
                tx.rollback();
                blocked
            }
            Err(e) => {
                log::error!("merge transaction failed: {}", e);
                tx.rollback();
                MergeOutcome::Failure(e.to_string())
            }
        };
        tx.discard();
        outcome
    }

    fn execute(&self, req: &MergeRequest, tx: &mut MergeTransaction) -> Result<MergeOutcome> {
        let eligible = self.eligible_files(req)?;
        if eligible.is_empty() {
            return Ok(MergeOutcome::Warning(
                "no eligible files to merge".to_string(),
            ));
        }

        // Phase 1: pre-flight duplicate scan, before any mutation.
        if req.precheck_duplicates {
            let reports = self.precheck_duplicates(&eligible)?;
            if !reports.is_empty() {
                return Ok(MergeOutcome::Warning(format!(
                    "duplicate keys detected before merge: {}",
                    bounded_report(&reports, crate::DUPLICATE_REPORT_LIMIT)
                )));
            }
        } else {
            self.progress
                .report("precheck skipped", PHASE_PRECHECK.end, 0, 0);
        }

        // Phase 2: back up every target file about to be touched.
        let total = eligible.len() as u64;
        for (done, file) in eligible.iter().enumerate() {
            self.cancel.check()?;
            let target_path = req.target_dir.join(&file.name);
            if target_path.is_file() {
                tx.backup(&target_path)?;
            }
            self.progress.report(
                &format!("backed up {}", file.name),
                PHASE_BACKUP.at(done as u64 + 1, total),
                done as u64 + 1,
                total,
            );
        }

        // Phase 3: merge user folders in sequence, file by file. The ledger
        // remembers which source last touched each entity projection so a
        // conflict can name both actors.
        let mut ledgers: HashMap<String, HashMap<String, String>> = HashMap::new();
        let total_steps: u64 = eligible.iter().map(|f| f.users.len() as u64).sum();
        let mut done_steps = 0u64;

        for user_dir in &req.user_dirs {
            for file in &eligible {
                if !file.users.iter().any(|u| u == user_dir) {
                    continue;
                }
                self.cancel.check()?;
                let ledger = ledgers.entry(file.name.clone()).or_default();
                if let Some(conflict) = self.merge_file(req, file, user_dir, ledger)? {
                    return Ok(MergeOutcome::Warning(conflict));
                }
                done_steps += 1;
                self.progress.report(
                    &format!("merged {} from {}", file.name, user_dir.display()),
                    PHASE_MERGE.at(done_steps, total_steps),
                    done_steps,
                    total_steps,
                );
            }
        }

        Ok(MergeOutcome::Success)
    }

    /// Files present in the baseline, carrying a key-column config entry, and
    /// present in at least one user folder. Unconfigured candidates are
    /// skipped with a warning, not an error.
    fn eligible_files(&self, req: &MergeRequest) -> Result<Vec<EligibleFile>> {
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(&req.baseline_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        let mut eligible = Vec::new();
        for name in names {
            let Some(config) = self.config.get(&name) else {
                log::warn!("no file config for {}, skipping", name);
                continue;
            };
            if config.key_columns.is_empty() {
                log::warn!("no key columns configured for {}, skipping", name);
                continue;
            }
            let users: Vec<PathBuf> = req
                .user_dirs
                .iter()
                .filter(|dir| dir.join(&name).is_file())
                .cloned()
                .collect();
            if users.is_empty() {
                continue;
            }
            eligible.push(EligibleFile {
                name,
                config: config.clone(),
                users,
            });
        }
        Ok(eligible)
    }

    /// Scan every (user, file) pair for internal duplicate keys.
    fn precheck_duplicates(&self, eligible: &[EligibleFile]) -> Result<Vec<String>> {
        let pairs: Vec<(&EligibleFile, &PathBuf)> = eligible
            .iter()
            .flat_map(|file| file.users.iter().map(move |user| (file, user)))
            .collect();
        let total = pairs.len() as u64;

        let mut reports = Vec::new();
        for (done, (file, user_dir)) in pairs.iter().enumerate() {
            self.cancel.check()?;
            let path = user_dir.join(&file.name);
            let format = TableFormat::detect(&path, Some(&file.config));
            let rows = format.load(&path)?;
            for key in duplicate_keys(&rows, &file.config)? {
                reports.push(format!(
                    "{}: duplicate key '{}' in {}",
                    file.name,
                    display_key(&key),
                    user_dir.display()
                ));
            }
            self.progress.report(
                &format!("prechecked {}", file.name),
                PHASE_PRECHECK.at(done as u64 + 1, total),
                done as u64 + 1,
                total,
            );
        }
        Ok(reports)
    }

    /// Merge one user's copy of one file into the target. Returns a conflict
    /// report instead of mutating when the user touches an entity some other
    /// actor already changed.
    fn merge_file(
        &self,
        req: &MergeRequest,
        file: &EligibleFile,
        user_dir: &Path,
        ledger: &mut HashMap<String, String>,
    ) -> Result<Option<String>> {
        let config = &file.config;
        let baseline_path = req.baseline_dir.join(&file.name);
        let target_path = req.target_dir.join(&file.name);
        let user_path = user_dir.join(&file.name);

        let format = TableFormat::detect(&baseline_path, Some(config));
        let baseline = format.load(&baseline_path)?;
        // A target file not written yet starts from the baseline rows.
        let target = if target_path.is_file() {
            format.load(&target_path)?
        } else {
            baseline.clone()
        };
        let user = format.load(&user_path)?;

        let target_diff = diff_tables(&baseline, &target, config)?;
        let user_diff = diff_tables(&baseline, &user, config)?;

        // Entities already touched: the target's pre-existing divergence from
        // the baseline, unless an earlier user folder in this transaction is
        // already on record for them.
        for parts in target_diff.changed_key_parts() {
            let entity = project_entity_key(parts, &config.key_columns, config.entity_columns());
            ledger
                .entry(entity)
                .or_insert_with(|| "the target copy".to_string());
        }

        let mut conflicts: Vec<String> = Vec::new();
        let mut user_entities: Vec<String> = Vec::new();
        for parts in user_diff.changed_key_parts() {
            let entity = project_entity_key(parts, &config.key_columns, config.entity_columns());
            if let Some(prior) = ledger.get(&entity) {
                conflicts.push(format!(
                    "entity '{}' already changed by {}",
                    display_key(&entity),
                    prior
                ));
            }
            user_entities.push(entity);
        }

        if !conflicts.is_empty() {
            conflicts.sort();
            conflicts.dedup();
            return Ok(Some(format!(
                "conflict in {} from user folder {}: {}",
                file.name,
                user_dir.display(),
                bounded_report(&conflicts, crate::CONFLICT_REPORT_LIMIT)
            )));
        }

        for entity in user_entities {
            ledger.insert(entity, format!("user folder {}", user_dir.display()));
        }

        if user_diff.is_unchanged() {
            log::debug!("{}: no changes from {}", file.name, user_dir.display());
            return Ok(None);
        }

        // Conflict-free: apply the user diff onto the full target map.
        let header = target
            .first()
            .cloned()
            .ok_or_else(|| TabmergeError::merge(format!("{}: empty target table", file.name)))?;
        let mut merged = key_row_map(&target, config)?;
        for entry in &user_diff.deleted {
            merged.shift_remove(&entry.key);
        }
        for entry in user_diff.added.iter().chain(user_diff.modified.iter()) {
            if let Some(row) = &entry.right {
                merged.insert(entry.key.clone(), row.clone());
            }
        }

        // Re-serialize sorted by the key columns in declared order,
        // date-aware per value, full-line ordinal tiebreak.
        let header_index = header_index_map(&header);
        let key_indexes = resolve_key_indexes(&header_index, &config.key_columns)?;
        let mut rows: Vec<Row> = merged.into_values().collect();
        rows.sort_by(|a, b| compare_rows_by_key(a, b, &key_indexes));

        let mut out = Vec::with_capacity(rows.len() + 1);
        out.push(header);
        out.extend(rows);
        format.write(&target_path, &out)?;

        log::info!(
            "merged {} from {}: +{} -{} ~{}",
            file.name,
            user_dir.display(),
            user_diff.added_count(),
            user_diff.deleted_count(),
            user_diff.modified_count()
        );
        Ok(None)
    }

    /// Phase 4: delete backups after full success.
    fn delete_backups(&self, tx: &MergeTransaction) {
        let total = tx.backups.len() as u64;
        for (done, (_, backup)) in tx.backups.iter().enumerate() {
            let _ = fs::remove_file(backup);
            self.progress.report(
                "cleaning up backups",
                PHASE_CLEANUP.at(done as u64 + 1, total),
                done as u64 + 1,
                total,
            );
        }
        self.progress.report("merge complete", 100, total, total);
    }
}

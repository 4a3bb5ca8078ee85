//! The restore pipeline: destination resolution, collision backups,
//! integrity verification, batch execution, and session rollback.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::TrashConfig;
use crate::delete::DeleteEngine;
use crate::errors::{Result, TrashError};
use crate::fs::{FileSystem, TrashMover};
use crate::helpers::{self, BACKUP_TIME_FORMAT};
use crate::metrics::MetricsCollector;
use crate::models::{DeleteOptions, DeleteResult, RestoreOptions, RestoreResult, TrashedItem};
use crate::store::MetadataStore;
use crate::validate::{PathIntent, PathValidator};

/// Moves trashed items back to their original (or an explicit) location.
pub struct RestoreEngine {
    config: TrashConfig,
    validator: PathValidator,
    fs: Arc<dyn FileSystem>,
    mover: Box<dyn TrashMover>,
    store: Arc<MetadataStore>,
    metrics: Arc<MetricsCollector>,
    pool: rayon::ThreadPool,
}

/// Where the bytes went during one successful move.
struct Moved {
    restored_path: PathBuf,
    displaced_backup: Option<PathBuf>,
}

impl RestoreEngine {
    pub fn new(
        config: TrashConfig,
        store: Arc<MetadataStore>,
        metrics: Arc<MetricsCollector>,
        fs: Arc<dyn FileSystem>,
        mover: Box<dyn TrashMover>,
    ) -> Result<Self> {
        let validator = PathValidator::new(&config, Arc::clone(&fs));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .thread_name(|i| format!("trash-restore-{i}"))
            .build()
            .map_err(|err| TrashError::internal(format!("thread pool: {err}")))?;
        Ok(Self {
            config,
            validator,
            fs,
            mover,
            store,
            metrics,
            pool,
        })
    }

    /// Lists restorable entries, optionally filtered by pattern and capped.
    pub fn list_restorable(
        &self,
        pattern: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<TrashedItem> {
        let mut items = match pattern {
            Some(pattern) => self.store.search(pattern),
            None => self.store.list(),
        };
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        items
    }

    /// Restores one item. The attempt counter increments regardless of
    /// outcome; a failure before the move leaves the item trashed so a retry
    /// is always possible.
    pub fn restore(&self, item: &TrashedItem, options: &RestoreOptions) -> RestoreResult {
        self.restore_tracked(item, options).0
    }

    /// As `restore`, recording a successful move into `session` so the whole
    /// batch can be rolled back later.
    pub fn restore_with_session(
        &self,
        item: &TrashedItem,
        options: &RestoreOptions,
        session: &mut RestoreSession,
    ) -> RestoreResult {
        let (result, moved) = self.restore_tracked(item, options);
        if let Some(moved) = moved {
            session.entries.push(SessionEntry {
                restored_path: moved.restored_path,
                displaced_backup: moved.displaced_backup,
            });
        }
        result
    }

    /// Restores a set of items with bounded concurrency, mirroring the
    /// delete engine's batch semantics: results index-aligned with input.
    pub fn restore_batch(
        &self,
        items: &[TrashedItem],
        options: &RestoreOptions,
    ) -> Vec<RestoreResult> {
        self.pool.install(|| {
            items
                .par_iter()
                .map(|item| self.restore(item, options))
                .collect()
        })
    }

    fn restore_tracked(
        &self,
        item: &TrashedItem,
        options: &RestoreOptions,
    ) -> (RestoreResult, Option<Moved>) {
        let started = Instant::now();
        let guard = self.metrics.begin();
        let outcome = self.restore_inner(item, options);
        drop(guard);

        match outcome {
            Ok(moved) => {
                let verify_error = self.verify(&moved.restored_path, item);
                let success = verify_error.is_none();
                self.metrics.record(success, item.size, started.elapsed());
                if success {
                    tracing::debug!(
                        id = %item.id,
                        to = %moved.restored_path.display(),
                        "restored"
                    );
                }
                let result = RestoreResult {
                    id: item.id.clone(),
                    path: item.original_path.clone(),
                    restored_path: Some(moved.restored_path.clone()),
                    success,
                    error: verify_error,
                };
                (result, Some(moved))
            }
            Err(err) => {
                self.metrics.record(false, 0, started.elapsed());
                tracing::debug!(id = %item.id, kind = %err.kind(), "restore failed");
                let result = RestoreResult {
                    id: item.id.clone(),
                    path: item.original_path.clone(),
                    restored_path: None,
                    success: false,
                    error: Some(err),
                };
                (result, None)
            }
        }
    }

    fn restore_inner(&self, item: &TrashedItem, options: &RestoreOptions) -> Result<Moved> {
        let mut current = self
            .store
            .lookup(&item.id)
            .ok_or_else(|| TrashError::NoSuchEntry(item.id.clone()))?;
        current.restore_attempts += 1;
        current.last_restore_at = Some(DateTime::<Utc>::from(self.fs.now()));
        self.store.update(&current)?;

        let destination = match &options.target_dir {
            Some(dir) => dir.join(&current.name),
            None => current.original_path.clone(),
        };
        self.validator
            .validate(&destination, PathIntent::RestoreDestination)?;

        // Classifies a vanished trash file as FileNotFound up front.
        self.fs.symlink_metadata(&current.trash_path)?;

        if let Some(parent) = destination.parent() {
            if !self.fs.exists(parent) {
                self.fs.create_dir_all(parent)?;
            }
        }

        let mut displaced_backup = None;
        if self.fs.exists(&destination) {
            if options.overwrite {
                let meta = self.fs.symlink_metadata(&destination)?;
                if meta.is_dir() {
                    self.fs.remove_dir_all(&destination)?;
                } else {
                    self.fs.remove_file(&destination)?;
                }
            } else {
                let backup = backup_path(&destination, self.fs.now().into());
                self.fs.rename(&destination, &backup)?;
                tracing::debug!(
                    original = %destination.display(),
                    backup = %backup.display(),
                    "displaced existing file to backup"
                );
                displaced_backup = Some(backup);
            }
        }

        self.mover.move_path(&current.trash_path, &destination)?;

        // Bytes are back in place; the record must go even if verification
        // later disagrees, otherwise it would point at a missing trash file.
        if let Err(err) = self.store.remove(&current.id) {
            tracing::warn!(id = %current.id, error = %err, "restored but metadata removal failed");
        }

        Ok(Moved {
            restored_path: destination,
            displaced_backup,
        })
    }

    /// Confirms restored content against the record: size always, checksum
    /// when one was computed at delete time. The move is not rolled back on
    /// mismatch; a partial restore beats data in limbo.
    fn verify(&self, restored: &Path, item: &TrashedItem) -> Option<TrashError> {
        if !self.config.verify_on_restore {
            return None;
        }
        let meta = match self.fs.metadata(restored) {
            Ok(meta) => meta,
            Err(err) => return Some(err),
        };
        if meta.is_dir() {
            return None;
        }
        if meta.len() != item.size {
            return Some(TrashError::Verification {
                path: restored.to_path_buf(),
                recorded: item.size,
                found: meta.len(),
            });
        }
        if let Some(recorded_sum) = &item.checksum {
            match helpers::compute_checksum(restored, meta.len(), Some(u64::MAX)) {
                Ok(Some(actual)) if &actual != recorded_sum => {
                    return Some(TrashError::Verification {
                        path: restored.to_path_buf(),
                        recorded: item.size,
                        found: meta.len(),
                    });
                }
                Ok(_) => {}
                Err(err) => return Some(err),
            }
        }
        None
    }

    /// Undoes every successful restore in the session: each restored file is
    /// re-deleted into the trash and any displaced backup is reinstated.
    /// Entries are unwound newest-first.
    pub fn rollback(
        &self,
        session: RestoreSession,
        delete_engine: &DeleteEngine,
    ) -> Vec<DeleteResult> {
        let mut results = Vec::with_capacity(session.entries.len());
        let options = DeleteOptions {
            recursive: true,
            ..Default::default()
        };
        for entry in session.entries.into_iter().rev() {
            let result = match delete_engine.safe_delete(&entry.restored_path, &options) {
                Ok(_) => DeleteResult::ok(entry.restored_path.clone()),
                Err(err) => DeleteResult::failed(entry.restored_path.clone(), err),
            };
            if result.success {
                if let Some(backup) = &entry.displaced_backup {
                    if let Err(err) = self.fs.rename(backup, &entry.restored_path) {
                        tracing::warn!(
                            backup = %backup.display(),
                            error = %err,
                            "failed to reinstate displaced backup"
                        );
                    }
                }
            }
            results.push(result);
        }
        results
    }
}

/// Groups a sequence of restores so they can be undone in one call.
#[derive(Debug, Default)]
pub struct RestoreSession {
    name: String,
    entries: Vec<SessionEntry>,
}

#[derive(Debug)]
struct SessionEntry {
    restored_path: PathBuf,
    displaced_backup: Option<PathBuf>,
}

impl RestoreSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of successful restores recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Timestamped sibling name for a file displaced by a restore.
fn backup_path(destination: &Path, now: DateTime<Utc>) -> PathBuf {
    let stamp = now.format(BACKUP_TIME_FORMAT);
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "item".to_string());
    destination.with_file_name(format!("{name}.backup.{stamp}"))
}

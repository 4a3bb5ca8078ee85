//! The delete pipeline: validate, stat, move into the trash, record
//! metadata, and report per-item results for single and batch execution.

use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::TrashConfig;
use crate::errors::{Result, TrashError};
use crate::fs::{dir_size, FileSystem, TrashMover};
use crate::helpers;
use crate::metrics::MetricsCollector;
use crate::models::{DeleteOptions, DeleteResult, TrashedItem};
use crate::store::MetadataStore;
use crate::validate::{PathIntent, PathValidator};

/// Cooperative cancellation flag shared between a caller and in-flight
/// batch work. Cancellation only prevents units that have not started;
/// filesystem moves already underway run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Moves files and directories into the trash root.
pub struct DeleteEngine {
    config: TrashConfig,
    validator: PathValidator,
    fs: Arc<dyn FileSystem>,
    mover: Box<dyn TrashMover>,
    store: Arc<MetadataStore>,
    metrics: Arc<MetricsCollector>,
    trash_root: PathBuf,
    pool: rayon::ThreadPool,
    collision_counter: AtomicU64,
    /// Trash-side names claimed by in-flight units, so two concurrent moves
    /// can never target the same destination.
    reserved: Mutex<HashSet<PathBuf>>,
}

impl DeleteEngine {
    pub fn new(
        config: TrashConfig,
        trash_root: PathBuf,
        store: Arc<MetadataStore>,
        metrics: Arc<MetricsCollector>,
        fs: Arc<dyn FileSystem>,
        mover: Box<dyn TrashMover>,
    ) -> Result<Self> {
        let validator = PathValidator::new(&config, Arc::clone(&fs));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .thread_name(|i| format!("trash-delete-{i}"))
            .build()
            .map_err(|err| TrashError::internal(format!("thread pool: {err}")))?;
        Ok(Self {
            config,
            validator,
            fs,
            mover,
            store,
            metrics,
            trash_root,
            pool,
            collision_counter: AtomicU64::new(0),
            reserved: Mutex::new(HashSet::new()),
        })
    }

    /// Validates and moves one path into the trash, recording metadata.
    ///
    /// Emits exactly one metrics sample regardless of outcome. Returns the
    /// new record, or `None` for a dry run.
    pub fn safe_delete(
        &self,
        path: &Path,
        options: &DeleteOptions,
    ) -> Result<Option<TrashedItem>> {
        let started = Instant::now();
        let guard = self.metrics.begin();
        let outcome = self.delete_inner(path, options);
        drop(guard);

        let bytes = match &outcome {
            Ok(Some(item)) => item.size,
            _ => 0,
        };
        self.metrics.record(outcome.is_ok(), bytes, started.elapsed());

        match &outcome {
            Ok(Some(item)) => {
                tracing::debug!(path = %path.display(), id = %item.id, "trashed");
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "dry run, no move performed");
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), kind = %err.kind(), "delete failed");
            }
        }
        outcome
    }

    /// Runs `safe_delete` over all paths with bounded concurrency.
    ///
    /// Results are index-aligned with the input order, never completion
    /// order; callers correlate results back to user-visible names by index.
    pub fn batch_delete(&self, paths: &[PathBuf], options: &DeleteOptions) -> Vec<DeleteResult> {
        self.pool.install(|| {
            paths
                .par_iter()
                .map(|path| self.delete_to_result(path, options, None))
                .collect()
        })
    }

    /// As `batch_delete`, but each unit checks the token before starting.
    /// Units cancelled before starting carry the cancellation error instead
    /// of attempting the move.
    pub fn batch_delete_with_cancel(
        &self,
        paths: &[PathBuf],
        options: &DeleteOptions,
        token: &CancelToken,
    ) -> Vec<DeleteResult> {
        self.pool.install(|| {
            paths
                .par_iter()
                .map(|path| self.delete_to_result(path, options, Some(token)))
                .collect()
        })
    }

    fn delete_to_result(
        &self,
        path: &Path,
        options: &DeleteOptions,
        token: Option<&CancelToken>,
    ) -> DeleteResult {
        // Checked once a pool thread picks the unit up. A unit that has not
        // passed this point holds no concurrency slot yet, so this is
        // equivalent to gating slot acquisition itself.
        if let Some(token) = token {
            if token.is_cancelled() {
                return DeleteResult::failed(
                    path.to_path_buf(),
                    TrashError::Cancelled(path.to_path_buf()),
                );
            }
        }
        match self.safe_delete(path, options) {
            Ok(Some(_)) => DeleteResult::ok(path.to_path_buf()),
            Ok(None) => DeleteResult::skipped(path.to_path_buf()),
            Err(err) => DeleteResult::failed(path.to_path_buf(), err),
        }
    }

    fn delete_inner(&self, path: &Path, options: &DeleteOptions) -> Result<Option<TrashedItem>> {
        self.validator.validate(path, PathIntent::Delete)?;

        let meta = self.fs.symlink_metadata(path)?;
        let is_dir = meta.is_dir();
        if is_dir && !options.recursive {
            return Err(TrashError::IsDirectory(path.to_path_buf()));
        }
        if options.dry_run {
            return Ok(None);
        }

        let size = if is_dir { dir_size(&*self.fs, path)? } else { meta.len() };
        let modified = meta.modified().unwrap_or_else(|_| self.fs.now());

        // Persisted records carry absolute original paths so restoration
        // works from any working directory.
        let original = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|err| TrashError::io("getcwd", path, err))?
                .join(path)
        };

        let trash_path = self.reserve_trash_path(path);
        let moved = self.mover.move_path(path, &trash_path);
        // On success the file now occupies the name on disk; on failure the
        // name goes back into circulation.
        self.release_trash_path(&trash_path);
        moved?;

        // A crash here orphans the trash file; cleanup's disk-presence check
        // is the only detector.
        let item = self
            .store
            .record(
                &original,
                &trash_path,
                size,
                modified,
                is_dir,
                &self.config.deleted_by,
                self.config.checksum_max_bytes,
            )
            .map_err(|err| {
                tracing::warn!(
                    trash_path = %trash_path.display(),
                    "moved to trash but metadata write failed; entry is orphaned"
                );
                err
            })?;
        Ok(Some(item))
    }

    /// Picks an unused trash-side name and claims it against concurrent
    /// units under one lock, so the disk check and the claim are a single
    /// step. Collisions get a deterministic `name.<pid>.<counter>` suffix;
    /// an existing or claimed trash path is never handed out twice.
    fn reserve_trash_path(&self, original: &Path) -> PathBuf {
        let name = original
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("item");
        let mut reserved = self.lock_reserved();
        let plain = self.trash_root.join(name);
        if !self.fs.exists(&plain) && reserved.insert(plain.clone()) {
            return plain;
        }
        let pid = std::process::id();
        loop {
            let counter = self.collision_counter.fetch_add(1, Ordering::SeqCst);
            let candidate = self
                .trash_root
                .join(helpers::build_unique_basename(name, pid, counter));
            if !self.fs.exists(&candidate) && reserved.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn release_trash_path(&self, path: &Path) {
        self.lock_reserved().remove(path);
    }

    fn lock_reserved(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! The narrow contract the caller layer (CLI, scripts) speaks to. The core
//! never prompts or prints; presentation is caller responsibility.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::TrashConfig;
use crate::delete::{CancelToken, DeleteEngine};
use crate::errors::{Result, TrashError};
use crate::fs::{dir_size, platform_mover, FileSystem, RealFileSystem};
use crate::locator::TrashLocator;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::models::{
    sort_items, DeleteOptions, DeleteResult, RestoreOptions, RestoreResult, RestoreSelector,
    SortKey, TrashedItem,
};
use crate::restore::RestoreEngine;
use crate::store::{MetadataStore, METADATA_DIR};

/// Facade over the trash lifecycle: delete, list, restore, purge, cleanup.
///
/// One instance owns one trash root. Construction wires the locator, the
/// metadata store, both engines, and a shared metrics collector.
pub struct TrashBin {
    fs: Arc<dyn FileSystem>,
    trash_root: PathBuf,
    store: Arc<MetadataStore>,
    metrics: Arc<MetricsCollector>,
    delete_engine: DeleteEngine,
    restore_engine: RestoreEngine,
}

impl TrashBin {
    /// Opens the platform trash root for the current user.
    pub fn open(config: TrashConfig) -> Result<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let root = TrashLocator::new(Arc::clone(&fs)).resolve()?;
        Self::build(config, fs, root)
    }

    /// Opens an explicit trash root; used by embedding callers and tests.
    pub fn open_at(config: TrashConfig, root: impl Into<PathBuf>) -> Result<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let root = TrashLocator::with_root(Arc::clone(&fs), root).resolve()?;
        Self::build(config, fs, root)
    }

    fn build(config: TrashConfig, fs: Arc<dyn FileSystem>, root: PathBuf) -> Result<Self> {
        let store = Arc::new(MetadataStore::open(&root, Arc::clone(&fs))?);
        let metrics = Arc::new(MetricsCollector::new());
        let delete_engine = DeleteEngine::new(
            config.clone(),
            root.clone(),
            Arc::clone(&store),
            Arc::clone(&metrics),
            Arc::clone(&fs),
            platform_mover(),
        )?;
        let restore_engine = RestoreEngine::new(
            config,
            Arc::clone(&store),
            Arc::clone(&metrics),
            Arc::clone(&fs),
            platform_mover(),
        )?;
        Ok(Self {
            fs,
            trash_root: root,
            store,
            metrics,
            delete_engine,
            restore_engine,
        })
    }

    pub fn trash_root(&self) -> &Path {
        &self.trash_root
    }

    /// Deletes a set of paths; one result per input path, index-aligned.
    pub fn delete(&self, paths: &[PathBuf], options: &DeleteOptions) -> Vec<DeleteResult> {
        self.delete_engine.batch_delete(paths, options)
    }

    /// As `delete`, honoring a cancellation token between units of work.
    pub fn delete_with_cancel(
        &self,
        paths: &[PathBuf],
        options: &DeleteOptions,
        token: &CancelToken,
    ) -> Vec<DeleteResult> {
        self.delete_engine
            .batch_delete_with_cancel(paths, options, token)
    }

    /// Current trash entries, sorted by the caller's chosen key.
    pub fn list(&self, sort: SortKey) -> Vec<TrashedItem> {
        let mut items = self.store.list();
        sort_items(&mut items, sort);
        items
    }

    /// Entries matching a name glob, path substring, or kind name.
    pub fn search(&self, pattern: &str) -> Vec<TrashedItem> {
        self.store.search(pattern)
    }

    /// Resolves a selector against the current listing. Indexes refer to the
    /// time-sorted listing, oldest first.
    pub fn select(&self, selector: &RestoreSelector) -> Result<Vec<TrashedItem>> {
        let selected = match selector {
            RestoreSelector::ByIndex(index) => {
                let items = self.list(SortKey::Time);
                match items.into_iter().nth(*index) {
                    Some(item) => vec![item],
                    None => return Err(TrashError::NoSuchEntry(format!("index {index}"))),
                }
            }
            RestoreSelector::ByName(name) => self
                .store
                .list()
                .into_iter()
                .filter(|item| &item.name == name)
                .collect(),
            RestoreSelector::ByPattern(pattern) => self.store.search(pattern),
            RestoreSelector::All => self.store.list(),
        };
        if selected.is_empty() {
            return Err(TrashError::NoSuchEntry(selector_label(selector)));
        }
        Ok(selected)
    }

    /// Restores everything the selector matches; one result per item.
    pub fn restore(
        &self,
        selector: &RestoreSelector,
        options: &RestoreOptions,
    ) -> Result<Vec<RestoreResult>> {
        let items = self.select(selector)?;
        Ok(self.restore_engine.restore_batch(&items, options))
    }

    /// Permanently removes trash content and clears metadata. Irreversible.
    ///
    /// Without `force`, only entries known to the metadata store are purged.
    /// With `force`, stray files in the trash root (orphans with no record)
    /// are removed as well.
    pub fn empty(&self, force: bool) -> Result<(usize, u64)> {
        let mut purged = 0usize;
        let mut bytes = 0u64;

        for item in self.store.clear()? {
            if !self.fs.exists(&item.trash_path) {
                continue;
            }
            self.remove_physical(&item.trash_path)?;
            purged += 1;
            bytes += item.size;
        }

        if force {
            for child in self.fs.list_dir(&self.trash_root)? {
                if child.file_name().map(|n| n == METADATA_DIR).unwrap_or(false) {
                    continue;
                }
                let meta = self.fs.symlink_metadata(&child)?;
                let size = if meta.is_dir() {
                    dir_size(&*self.fs, &child)?
                } else {
                    meta.len()
                };
                self.remove_physical(&child)?;
                purged += 1;
                bytes += size;
            }
        }

        tracing::info!(purged, bytes, "emptied trash");
        Ok((purged, bytes))
    }

    /// Evicts aged metadata records whose trash file is gone. Never deletes
    /// still-present trash content.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        self.store.cleanup(max_age)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn delete_engine(&self) -> &DeleteEngine {
        &self.delete_engine
    }

    pub fn restore_engine(&self) -> &RestoreEngine {
        &self.restore_engine
    }

    fn remove_physical(&self, path: &Path) -> Result<()> {
        let meta = self.fs.symlink_metadata(path)?;
        if meta.is_dir() {
            self.fs.remove_dir_all(path)
        } else {
            self.fs.remove_file(path)
        }
    }
}

fn selector_label(selector: &RestoreSelector) -> String {
    match selector {
        RestoreSelector::ByIndex(index) => format!("index {index}"),
        RestoreSelector::ByName(name) => format!("name {name}"),
        RestoreSelector::ByPattern(pattern) => format!("pattern {pattern}"),
        RestoreSelector::All => "all".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::fs as stdfs;

    fn bin_with_workdir() -> (TrashBin, tempfile::TempDir, tempfile::TempDir) {
        let trash_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let bin = TrashBin::open_at(TrashConfig::default(), trash_dir.path()).unwrap();
        (bin, trash_dir, work_dir)
    }

    fn make_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        stdfs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn select_by_name_and_pattern() {
        let (bin, _t, work) = bin_with_workdir();
        let paths = vec![
            make_file(&work, "alpha.txt", b"a"),
            make_file(&work, "beta.md", b"b"),
        ];
        bin.delete(&paths, &DeleteOptions::default());

        let by_name = bin.select(&RestoreSelector::ByName("alpha.txt".into())).unwrap();
        assert_eq!(by_name.len(), 1);

        let by_pattern = bin.select(&RestoreSelector::ByPattern("*.md".into())).unwrap();
        assert_eq!(by_pattern.len(), 1);
        assert_eq!(by_pattern[0].name, "beta.md");

        let all = bin.select(&RestoreSelector::All).unwrap();
        assert_eq!(all.len(), 2);

        let err = bin.select(&RestoreSelector::ByIndex(9)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn empty_purges_content_and_metadata() {
        let (bin, trash_dir, work) = bin_with_workdir();
        let paths = vec![
            make_file(&work, "x.txt", b"xx"),
            make_file(&work, "y.txt", b"yyy"),
        ];
        bin.delete(&paths, &DeleteOptions::default());
        assert_eq!(bin.list(SortKey::Name).len(), 2);

        let (purged, bytes) = bin.empty(false).unwrap();
        assert_eq!(purged, 2);
        assert_eq!(bytes, 5);
        assert!(bin.list(SortKey::Name).is_empty());

        // Only the metadata directory remains under the root.
        let leftovers: Vec<_> = stdfs::read_dir(trash_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from(METADATA_DIR)]);
    }

    #[test]
    fn force_empty_removes_orphaned_files() {
        let (bin, trash_dir, _work) = bin_with_workdir();
        stdfs::write(trash_dir.path().join("stray.bin"), b"orphan").unwrap();

        let (purged_gentle, _) = bin.empty(false).unwrap();
        assert_eq!(purged_gentle, 0);
        assert!(trash_dir.path().join("stray.bin").exists());

        let (purged_forced, bytes) = bin.empty(true).unwrap();
        assert_eq!(purged_forced, 1);
        assert_eq!(bytes, 6);
        assert!(!trash_dir.path().join("stray.bin").exists());
    }

    #[test]
    fn force_empty_counts_orphaned_directory_bytes() {
        let (bin, trash_dir, _work) = bin_with_workdir();
        let stray = trash_dir.path().join("stray-tree");
        stdfs::create_dir_all(stray.join("sub")).unwrap();
        stdfs::write(stray.join("a.bin"), b"1234").unwrap();
        stdfs::write(stray.join("sub/b.bin"), b"56").unwrap();

        let (purged, bytes) = bin.empty(true).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(bytes, 6);
        assert!(!stray.exists());
    }

    #[test]
    fn restore_by_selector_round_trips() {
        let (bin, _t, work) = bin_with_workdir();
        let path = make_file(&work, "come-back.txt", b"hello again");
        bin.delete(&[path.clone()], &DeleteOptions::default());
        assert!(!path.exists());

        let results = bin
            .restore(
                &RestoreSelector::ByName("come-back.txt".into()),
                &RestoreOptions::default(),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success, "error: {:?}", results[0].error);
        assert_eq!(stdfs::read(&path).unwrap(), b"hello again");
    }

    #[test]
    fn metrics_cover_both_engines() {
        let (bin, _t, work) = bin_with_workdir();
        let path = make_file(&work, "counted.txt", b"1234");
        bin.delete(&[path.clone()], &DeleteOptions::default());
        bin.restore(&RestoreSelector::All, &RestoreOptions::default())
            .unwrap();

        let snap = bin.metrics();
        assert_eq!(snap.operations, 2);
        assert_eq!(snap.successes, 2);
        assert_eq!(snap.bytes_processed, 8);
    }
}

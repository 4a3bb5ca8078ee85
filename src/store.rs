//! JSON-backed metadata store: one record per trashed item, persisted as a
//! single document under the trash root.
//!
//! The full record set is serialized on every mutating call
//! (load-modify-save). A single `Mutex` guards the in-memory map and the
//! document; concurrent writers in *separate processes* are not coordinated,
//! which is an accepted limitation for a single-process tool.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use crate::errors::{Result, TrashError};
use crate::fs::FileSystem;
use crate::helpers;
use crate::models::{FileKind, TrashedItem};

/// Directory under the trash root that holds the metadata document.
pub const METADATA_DIR: &str = ".metadata";

/// Name of the metadata document.
pub const METADATA_FILE: &str = "deleted_files.json";

pub struct MetadataStore {
    document_path: PathBuf,
    fs: Arc<dyn FileSystem>,
    items: Mutex<HashMap<String, TrashedItem>>,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("document_path", &self.document_path)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl MetadataStore {
    /// Opens the store for a trash root, loading the existing document when
    /// present.
    pub fn open(trash_root: &Path, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let document_path = trash_root.join(METADATA_DIR).join(METADATA_FILE);
        let mut items = HashMap::new();
        if fs.exists(&document_path) {
            let text = fs.read_to_string(&document_path)?;
            let records: Vec<TrashedItem> =
                serde_json::from_str(&text).map_err(|err| TrashError::Metadata {
                    path: document_path.clone(),
                    source: err,
                })?;
            for record in records {
                items.insert(record.id.clone(), record);
            }
        }
        tracing::debug!(
            document = %document_path.display(),
            entries = items.len(),
            "metadata store opened"
        );
        Ok(Self {
            document_path,
            fs,
            items: Mutex::new(items),
        })
    }

    /// Builds and persists the record for a completed move into the trash.
    ///
    /// Derives the id from the original path and modification time,
    /// classifies the content kind by extension, and computes a checksum for
    /// files at or below the size threshold. The bytes are read from
    /// `trash_path`, where they already live.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        original_path: &Path,
        trash_path: &Path,
        size: u64,
        modified: SystemTime,
        is_dir: bool,
        deleted_by: &str,
        checksum_max_bytes: Option<u64>,
    ) -> Result<TrashedItem> {
        let checksum = if is_dir {
            None
        } else {
            helpers::compute_checksum(trash_path, size, checksum_max_bytes)?
        };
        let item = TrashedItem {
            id: helpers::derive_item_id(original_path, modified),
            original_path: original_path.to_path_buf(),
            trash_path: trash_path.to_path_buf(),
            name: original_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "item".to_string()),
            size,
            kind: helpers::classify_kind(original_path, is_dir),
            checksum,
            deleted_at: DateTime::<Utc>::from(self.fs.now()),
            deleted_by: deleted_by.to_string(),
            restore_attempts: 0,
            last_restore_at: None,
        };

        let mut items = self.lock();
        items.insert(item.id.clone(), item.clone());
        self.persist(&items)?;
        Ok(item)
    }

    pub fn lookup(&self, id: &str) -> Option<TrashedItem> {
        self.lock().get(id).cloned()
    }

    pub fn list(&self) -> Vec<TrashedItem> {
        let mut all: Vec<TrashedItem> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.deleted_at.cmp(&b.deleted_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Matches by name glob, original-path substring, or content kind name.
    pub fn search(&self, pattern: &str) -> Vec<TrashedItem> {
        let kind_match = |kind: FileKind| kind.as_str() == pattern;
        let mut found: Vec<TrashedItem> = self
            .lock()
            .values()
            .filter(|item| {
                helpers::glob_match(pattern, &item.name)
                    || item.original_path.to_string_lossy().contains(pattern)
                    || kind_match(item.kind)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.deleted_at.cmp(&b.deleted_at).then_with(|| a.id.cmp(&b.id)));
        found
    }

    /// Replaces an existing record; used for restore-attempt accounting.
    pub fn update(&self, item: &TrashedItem) -> Result<()> {
        let mut items = self.lock();
        items.insert(item.id.clone(), item.clone());
        self.persist(&items)
    }

    /// Detaches a record. Does not touch the physical trash file; callers
    /// move or delete the bytes themselves.
    pub fn remove(&self, id: &str) -> Result<Option<TrashedItem>> {
        let mut items = self.lock();
        let removed = items.remove(id);
        if removed.is_some() {
            self.persist(&items)?;
        }
        Ok(removed)
    }

    /// Evicts records older than `max_age` whose trash file no longer exists
    /// on disk. Records with live content are never evicted.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let now = DateTime::<Utc>::from(self.fs.now());
        let cutoff = chrono::Duration::from_std(max_age)
            .map_err(|err| TrashError::internal(format!("max_age out of range: {err}")))?;

        let mut items = self.lock();
        let orphaned: Vec<String> = items
            .values()
            .filter(|item| {
                now.signed_duration_since(item.deleted_at) > cutoff
                    && !self.fs.exists(&item.trash_path)
            })
            .map(|item| item.id.clone())
            .collect();
        for id in &orphaned {
            items.remove(id);
            tracing::debug!(id = %id, "evicted orphaned metadata record");
        }
        if !orphaned.is_empty() {
            self.persist(&items)?;
        }
        Ok(orphaned.len())
    }

    /// Drains every record, persisting an empty document. Used by purge.
    pub fn clear(&self) -> Result<Vec<TrashedItem>> {
        let mut items = self.lock();
        let drained: Vec<TrashedItem> = items.drain().map(|(_, item)| item).collect();
        self.persist(&items)?;
        Ok(drained)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TrashedItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, items: &HashMap<String, TrashedItem>) -> Result<()> {
        let mut records: Vec<&TrashedItem> = items.values().collect();
        records.sort_by(|a, b| a.deleted_at.cmp(&b.deleted_at).then_with(|| a.id.cmp(&b.id)));
        let json =
            serde_json::to_vec_pretty(&records).map_err(|err| TrashError::Metadata {
                path: self.document_path.clone(),
                source: err,
            })?;
        if let Some(parent) = self.document_path.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.write(&self.document_path, &json)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::{ErrorKind, TrashError};

/// Coarse content classification derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Directory,
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Code,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Code => "code",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted metadata record for one trashed file or directory.
///
/// Invariant: a record exists in the store iff an object exists at
/// `trash_path`. A violation is an orphan, repairable via cleanup, never a
/// fatal error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashedItem {
    /// Derived from the original path and its modification time; stable
    /// across re-reads, not globally unique across machines.
    pub id: String,
    pub original_path: PathBuf,
    /// The only way to locate the physical bytes.
    pub trash_path: PathBuf,
    pub name: String,
    pub size: u64,
    pub kind: FileKind,
    /// Content hash for files below the configured size threshold.
    pub checksum: Option<String>,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: String,
    #[serde(default)]
    pub restore_attempts: u32,
    #[serde(default)]
    pub last_restore_at: Option<DateTime<Utc>>,
}

/// Outcome of one attempted delete. Ephemeral, never persisted.
#[derive(Debug)]
pub struct DeleteResult {
    pub path: PathBuf,
    pub success: bool,
    /// Set when the operation validated but performed no move.
    pub dry_run: bool,
    pub error: Option<TrashError>,
}

impl DeleteResult {
    pub fn ok(path: PathBuf) -> Self {
        Self {
            path,
            success: true,
            dry_run: false,
            error: None,
        }
    }

    pub fn skipped(path: PathBuf) -> Self {
        Self {
            path,
            success: true,
            dry_run: true,
            error: None,
        }
    }

    pub fn failed(path: PathBuf, error: TrashError) -> Self {
        Self {
            path,
            success: false,
            dry_run: false,
            error: Some(error),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(TrashError::kind)
    }
}

/// Outcome of one attempted restore. Ephemeral, never persisted.
#[derive(Debug)]
pub struct RestoreResult {
    pub id: String,
    /// The trashed item's original path (identification for the caller).
    pub path: PathBuf,
    /// Where the bytes ended up, when the move itself succeeded.
    pub restored_path: Option<PathBuf>,
    pub success: bool,
    pub error: Option<TrashError>,
}

impl RestoreResult {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(TrashError::kind)
    }
}

/// Aggregate view of a finished batch; constructed only after every unit has
/// a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn of_deletes(results: &[DeleteResult]) -> Self {
        Self::tally(results.iter().map(|r| r.success))
    }

    pub fn of_restores(results: &[RestoreResult]) -> Self {
        Self::tally(results.iter().map(|r| r.success))
    }

    fn tally(flags: impl Iterator<Item = bool>) -> Self {
        let mut outcome = Self {
            total: 0,
            succeeded: 0,
            failed: 0,
        };
        for success in flags {
            outcome.total += 1;
            if success {
                outcome.succeeded += 1;
            } else {
                outcome.failed += 1;
            }
        }
        outcome
    }
}

/// How a caller picks trash entries for restoration.
#[derive(Debug, Clone)]
pub enum RestoreSelector {
    /// Index into the time-sorted listing (oldest first).
    ByIndex(usize),
    /// Exact match on the trashed item's name.
    ByName(String),
    /// Glob on name, or substring on the original path.
    ByPattern(String),
    All,
}

/// Options for delete operations, passed per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Allow directories to be trashed.
    pub recursive: bool,
    /// Validate and stat, but perform no move and record nothing.
    pub dry_run: bool,
}

/// Options for restore operations, passed per call.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Restore into this directory instead of the original location.
    pub target_dir: Option<PathBuf>,
    /// Replace an existing destination instead of backing it up.
    pub overwrite: bool,
}

/// Sort key for trash listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Size,
    Time,
}

/// Sorts a listing in place. Pure; ties broken by name for determinism.
pub fn sort_items(items: &mut [TrashedItem], key: SortKey) {
    match key {
        SortKey::Name => items.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Size => items.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name))),
        SortKey::Time => items.sort_by(|a, b| {
            a.deleted_at
                .cmp(&b.deleted_at)
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
}

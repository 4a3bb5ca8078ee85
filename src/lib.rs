//! Reversible file deletion.
//!
//! Instead of permanently erasing files, this crate relocates them to a
//! platform trash location, records enough metadata to restore them, and
//! exposes operations to list, restore, and permanently purge trashed
//! items. The crate is presentation-free: it never prompts or prints, and
//! callers own confirmation, formatting, and argument parsing.
//!
//! The usual entry point is [`TrashBin`]:
//!
//! ```no_run
//! use trash_lifecycle::{TrashBin, TrashConfig, DeleteOptions, RestoreSelector, RestoreOptions};
//!
//! # fn main() -> trash_lifecycle::Result<()> {
//! let bin = TrashBin::open(TrashConfig::default())?;
//! let results = bin.delete(&["/tmp/old-notes.txt".into()], &DeleteOptions::default());
//! assert!(results[0].success);
//! bin.restore(&RestoreSelector::ByName("old-notes.txt".into()), &RestoreOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delete;
pub mod errors;
pub mod fs;
pub mod helpers;
pub mod locator;
pub mod metrics;
pub mod models;
pub mod restore;
pub mod store;
pub mod trash;
pub mod validate;

pub use config::TrashConfig;
pub use delete::{CancelToken, DeleteEngine};
pub use errors::{ErrorKind, Result, TrashError};
pub use fs::{platform_mover, FileSystem, RealFileSystem, RenameMover, TrashMover};
pub use locator::TrashLocator;
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use models::{
    sort_items, BatchOutcome, DeleteOptions, DeleteResult, FileKind, RestoreOptions,
    RestoreResult, RestoreSelector, SortKey, TrashedItem,
};
pub use restore::{RestoreEngine, RestoreSession};
pub use store::{MetadataStore, METADATA_DIR, METADATA_FILE};
pub use trash::TrashBin;
pub use validate::{PathIntent, PathValidator};

/// Re-export a small stable API surface for caller crates.
pub mod prelude {
    pub use crate::{
        config::TrashConfig,
        delete::{CancelToken, DeleteEngine},
        errors::{ErrorKind, Result, TrashError},
        fs::{FileSystem, RealFileSystem},
        models::*,
        restore::{RestoreEngine, RestoreSession},
        trash::TrashBin,
    };
}

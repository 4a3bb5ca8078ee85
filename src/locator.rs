//! Per-platform resolution of the directory that physically holds trashed
//! files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{Result, TrashError};
use crate::fs::FileSystem;

/// Resolves and prepares the trash root for the current platform.
///
/// Linux follows the XDG trash layout (`$XDG_DATA_HOME/Trash/files`, falling
/// back to `~/.local/share/Trash/files`); macOS uses `~/.Trash`; Windows
/// uses a user-scoped directory under `%APPDATA%`. The directory is created
/// with owner-only permissions on Unix on first use.
pub struct TrashLocator {
    fs: Arc<dyn FileSystem>,
    /// Explicit root override; used by embedding callers and tests.
    root_override: Option<PathBuf>,
}

impl TrashLocator {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            root_override: None,
        }
    }

    /// Pins the trash root to an explicit directory, bypassing platform
    /// detection.
    pub fn with_root(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root_override: Some(root.into()),
        }
    }

    /// Returns the trash root, creating it if absent.
    pub fn resolve(&self) -> Result<PathBuf> {
        let root = match &self.root_override {
            Some(root) => root.clone(),
            None => platform_trash_root()?,
        };
        if !self.fs.exists(&root) {
            create_private_dir(&root)?;
            tracing::info!(root = %root.display(), "created trash root");
        }
        Ok(root)
    }
}

#[cfg(target_os = "linux")]
fn platform_trash_root() -> Result<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("Trash").join("files"));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".local/share/Trash/files"))
        .ok_or_else(|| TrashError::UnsupportedPlatform("no home directory".to_string()))
}

#[cfg(target_os = "macos")]
fn platform_trash_root() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".Trash"))
        .ok_or_else(|| TrashError::UnsupportedPlatform("no home directory".to_string()))
}

#[cfg(target_os = "windows")]
fn platform_trash_root() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|data| data.join("trash-lifecycle").join("files"))
        .ok_or_else(|| TrashError::UnsupportedPlatform("no APPDATA directory".to_string()))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn platform_trash_root() -> Result<PathBuf> {
    Err(TrashError::UnsupportedPlatform(
        std::env::consts::OS.to_string(),
    ))
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
        .map_err(|err| TrashError::io("mkdir", path, err))
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|err| TrashError::io("mkdir", path, err))
}

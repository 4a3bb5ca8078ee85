use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{Result, TrashError};

/// Filesystem abstraction boundary for the engines and the metadata store.
///
/// Keeping this trait narrow makes it easy to write deterministic tests and
/// allows alternative backends (e.g. an in-memory fs) if callers need it.
pub trait FileSystem: Send + Sync {
    /// Returns the current time in wall-clock format.
    fn now(&self) -> SystemTime;

    /// Returns true when path exists (symlink-aware).
    fn exists(&self, path: &Path) -> bool;

    /// Reads file metadata, following symlinks.
    fn metadata(&self, path: &Path) -> Result<Metadata>;

    /// Reads symlink metadata.
    fn symlink_metadata(&self, path: &Path) -> Result<Metadata>;

    /// Resolves one level of symlink.
    fn read_link(&self, path: &Path) -> Result<PathBuf>;

    /// Creates a directory and all missing parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Writes raw bytes (truncate + replace).
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Reads UTF-8 text.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Removes a file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Removes a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Renames/moves a path.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Lists directory children as concrete paths.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Opens an existing file for writing and drops the handle immediately,
    /// surfacing platform lock errors without changing the content.
    fn probe_write(&self, path: &Path) -> Result<()>;
}

/// Default filesystem implementation backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn metadata(&self, path: &Path) -> Result<Metadata> {
        fs::metadata(path).map_err(|err| TrashError::io("stat", path, err))
    }

    fn symlink_metadata(&self, path: &Path) -> Result<Metadata> {
        fs::symlink_metadata(path).map_err(|err| TrashError::io("lstat", path, err))
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).map_err(|err| TrashError::io("readlink", path, err))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|err| TrashError::io("mkdir", path, err))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        fs::write(path, data).map_err(|err| TrashError::io("write", path, err))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|err| TrashError::io("read", path, err))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|err| TrashError::io("unlink", path, err))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).map_err(|err| TrashError::io("rmdir", path, err))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|err| TrashError::io("rename", from, err))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)
            .map_err(|err| TrashError::io("readdir", path, err))?
            .map(|entry| entry.map(|v| v.path()))
            .collect::<std::result::Result<Vec<PathBuf>, io::Error>>()
            .map_err(|err| TrashError::io("readdir", path, err))
    }

    fn probe_write(&self, path: &Path) -> Result<()> {
        fs::OpenOptions::new()
            .write(true)
            .open(path)
            .map(|_| ())
            .map_err(|err| TrashError::io("open", path, err))
    }
}

/// Total byte size of a directory tree.
pub fn dir_size(fs: &dyn FileSystem, path: &Path) -> Result<u64> {
    let mut total = 0u64;
    for child in fs.list_dir(path)? {
        let meta = fs.symlink_metadata(&child)?;
        if meta.is_dir() {
            total += dir_size(fs, &child)?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Capability that physically relocates a path into or out of the trash.
///
/// Platform variants are selected at initialization time; business logic
/// never branches on the operating system.
pub trait TrashMover: Send + Sync {
    fn move_path(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Mover backed by `rename(2)`, with a copy-then-remove fallback when source
/// and destination live on different filesystems.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameMover;

#[cfg(unix)]
const EXDEV: i32 = 18;
#[cfg(windows)]
const ERROR_NOT_SAME_DEVICE: i32 = 17;

fn crosses_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(EXDEV)
    }
    #[cfg(windows)]
    {
        err.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

impl TrashMover for RenameMover {
    fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(err) if crosses_device(&err) => {
                tracing::debug!(from = %from.display(), to = %to.display(), "cross-device move, falling back to copy");
                copy_recursive(from, to)?;
                let meta = fs::symlink_metadata(from)
                    .map_err(|err| TrashError::io("lstat", from, err))?;
                if meta.is_dir() {
                    fs::remove_dir_all(from).map_err(|err| TrashError::io("rmdir", from, err))
                } else {
                    fs::remove_file(from).map_err(|err| TrashError::io("unlink", from, err))
                }
            }
            Err(err) => Err(TrashError::io("rename", from, err)),
        }
    }
}

fn copy_recursive(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(from).map_err(|err| TrashError::io("lstat", from, err))?;
    if meta.is_dir() {
        fs::create_dir_all(to).map_err(|err| TrashError::io("mkdir", to, err))?;
        let entries = fs::read_dir(from).map_err(|err| TrashError::io("readdir", from, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| TrashError::io("readdir", from, err))?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|err| TrashError::io("copy", from, err))
    }
}

/// Returns the mover appropriate for the current platform.
///
/// Every supported platform currently moves by rename into the resolved
/// trash root; OS recycle-bin API integration is out of scope.
pub fn platform_mover() -> Box<dyn TrashMover> {
    Box::new(RenameMover)
}

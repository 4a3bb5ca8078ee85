//! Path safety validation for delete targets and restore destinations.
//!
//! Pure checks only: the validator never mutates filesystem state. Both the
//! raw and the normalized form of a path are scanned for traversal, since
//! normalization alone is not trusted.

use std::env;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use crate::config::TrashConfig;
use crate::errors::{ErrorKind, Result, TrashError};
use crate::fs::FileSystem;

/// What the caller intends to do with the path being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathIntent {
    Delete,
    RestoreDestination,
}

#[cfg(unix)]
const PROTECTED_ROOTS: &[&str] = &[
    "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/usr/lib", "/etc", "/boot", "/dev", "/proc",
    "/sys", "/lib", "/lib64",
];

#[cfg(windows)]
const PROTECTED_ROOTS: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

#[cfg(not(any(unix, windows)))]
const PROTECTED_ROOTS: &[&str] = &[];

/// Substrings that mark an encoded or doubled-separator traversal attempt.
const ENCODED_TRAVERSAL: &[&str] = &["%2e%2e", "%2f", "%5c"];

/// Classifies a path as safe or unsafe for the given intent.
pub struct PathValidator {
    max_path_bytes: usize,
    protected: Vec<PathBuf>,
    fs: Arc<dyn FileSystem>,
}

impl PathValidator {
    pub fn new(config: &TrashConfig, fs: Arc<dyn FileSystem>) -> Self {
        let mut protected: Vec<PathBuf> =
            PROTECTED_ROOTS.iter().map(PathBuf::from).collect();
        protected.extend(config.extra_protected.iter().cloned());
        Self {
            max_path_bytes: config.max_path_bytes,
            protected,
            fs,
        }
    }

    /// Returns `Ok(())` when the path may be operated on, or the specific
    /// rejection otherwise.
    pub fn validate(&self, path: &Path, intent: PathIntent) -> Result<()> {
        let raw = path.to_string_lossy();
        if raw.trim().is_empty() {
            return Err(TrashError::invalid_path("empty path"));
        }
        if raw.len() > self.max_path_bytes {
            return Err(TrashError::invalid_path(format!(
                "path exceeds {} bytes",
                self.max_path_bytes
            )));
        }

        scan_traversal(&raw)?;

        let expanded = expand_env(&raw);
        let normalized = normalize_lexical(Path::new(&expanded))?;
        scan_traversal(&normalized.to_string_lossy())?;

        self.check_protected(&normalized)?;

        // Follow at most one level of symlink before re-checking the
        // deny-list; deeper chains are the filesystem's problem.
        if let Ok(meta) = self.fs.symlink_metadata(&normalized) {
            if meta.file_type().is_symlink() {
                if let Ok(target) = self.fs.read_link(&normalized) {
                    let target = if target.is_absolute() {
                        target
                    } else {
                        normalized
                            .parent()
                            .unwrap_or(Path::new(&MAIN_SEPARATOR.to_string()))
                            .join(target)
                    };
                    let target = normalize_lexical(&target)?;
                    self.check_protected(&target)?;
                }
            }
        }

        if intent == PathIntent::RestoreDestination {
            self.check_not_in_use(&normalized)?;
        }

        Ok(())
    }

    /// Best-effort lock detection for restore destinations. Only an explicit
    /// in-use signal from the platform rejects the path.
    fn check_not_in_use(&self, path: &Path) -> Result<()> {
        let meta = match self.fs.metadata(path) {
            Ok(meta) => meta,
            Err(_) => return Ok(()),
        };
        if meta.is_dir() {
            return Ok(());
        }
        match self.fs.probe_write(path) {
            Err(err) if err.kind() == ErrorKind::FileInUse => Err(err),
            _ => Ok(()),
        }
    }

    fn check_protected(&self, normalized: &Path) -> Result<()> {
        if normalized.parent().is_none() {
            // A filesystem root itself is never a valid target.
            return Err(TrashError::ProtectedPath(normalized.to_path_buf()));
        }
        for root in &self.protected {
            if normalized == root || normalized.starts_with(root) {
                return Err(TrashError::ProtectedPath(normalized.to_path_buf()));
            }
        }
        Ok(())
    }
}

fn scan_traversal(raw: &str) -> Result<()> {
    let lowered = raw.to_ascii_lowercase();
    for marker in ENCODED_TRAVERSAL {
        if lowered.contains(marker) {
            return Err(TrashError::PathTraversal(raw.to_string()));
        }
    }
    if raw.contains("//") || raw.contains("\\\\") {
        return Err(TrashError::PathTraversal(raw.to_string()));
    }
    let has_parent_component = Path::new(raw)
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    if has_parent_component {
        return Err(TrashError::PathTraversal(raw.to_string()));
    }
    Ok(())
}

/// Expands `~`, `$VAR`, `${VAR}` and `%VAR%` references. Unknown variables
/// expand to the empty string, matching shell behavior.
fn expand_env(input: &str) -> String {
    let input: String = if input == "~" || input.starts_with("~/") || input.starts_with("~\\") {
        match dirs::home_dir() {
            Some(home) => format!("{}{}", home.display(), &input[1..]),
            None => input.to_string(),
        }
    } else {
        input.to_string()
    };

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut name = String::new();
                    for c2 in chars.by_ref() {
                        if c2 == '}' {
                            break;
                        }
                        name.push(c2);
                    }
                    out.push_str(&env::var(&name).unwrap_or_default());
                } else {
                    let mut name = String::new();
                    while let Some(&c2) = chars.peek() {
                        if c2.is_alphanumeric() || c2 == '_' {
                            name.push(c2);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        out.push('$');
                    } else {
                        out.push_str(&env::var(&name).unwrap_or_default());
                    }
                }
            }
            '%' => {
                let rest: String = chars.clone().collect();
                match rest.find('%') {
                    Some(end)
                        if end > 0
                            && rest[..end].chars().all(|c| c.is_alphanumeric() || c == '_') =>
                    {
                        out.push_str(&env::var(&rest[..end]).unwrap_or_default());
                        for _ in 0..=end {
                            chars.next();
                        }
                    }
                    _ => out.push('%'),
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Resolves `.` and `..` lexically against an absolute base. Popping past
/// the root is a traversal error.
fn normalize_lexical(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|err| TrashError::io("getcwd", path, err))?
            .join(path)
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(MAIN_SEPARATOR.to_string()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(TrashError::PathTraversal(
                        path.to_string_lossy().into_owned(),
                    ));
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFileSystem;

    fn validator() -> PathValidator {
        PathValidator::new(&TrashConfig::default(), Arc::new(RealFileSystem))
    }

    #[test]
    fn accepts_ordinary_temp_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        assert!(validator().validate(&path, PathIntent::Delete).is_ok());
        assert!(validator()
            .validate(&path, PathIntent::RestoreDestination)
            .is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        let v = validator();
        let err = v.validate(Path::new(""), PathIntent::Delete).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let long = format!("/tmp/{}", "x".repeat(5000));
        let err = v.validate(Path::new(&long), PathIntent::Delete).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn rejects_traversal_sequences() {
        let v = validator();
        for candidate in [
            "../../etc/passwd",
            "/tmp/a/../b",
            "/tmp//double",
            "/tmp/%2e%2e/escape",
            "/tmp/enc%2fslash",
        ] {
            let err = v
                .validate(Path::new(candidate), PathIntent::Delete)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathTraversal, "case: {candidate}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn rejects_protected_roots() {
        let v = validator();
        for candidate in ["/usr/bin/ls", "/etc/passwd", "/boot/vmlinuz", "/"] {
            let err = v
                .validate(Path::new(candidate), PathIntent::Delete)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ProtectedPath, "case: {candidate}");
        }
    }

    #[test]
    fn extra_protected_roots_are_honored() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrashConfig::default().with_protected(dir.path());
        let v = PathValidator::new(&config, Arc::new(RealFileSystem));
        let err = v
            .validate(&dir.path().join("guarded.txt"), PathIntent::Delete)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtectedPath);
    }

    #[cfg(unix)]
    #[test]
    fn follows_one_symlink_level() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("sneaky");
        std::os::unix::fs::symlink("/etc", &link).unwrap();
        let err = validator().validate(&link, PathIntent::Delete).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtectedPath);
    }

    #[test]
    fn env_expansion() {
        env::set_var("TRASH_LIFECYCLE_TEST_DIR", "/tmp/expanded");
        assert_eq!(
            expand_env("$TRASH_LIFECYCLE_TEST_DIR/file"),
            "/tmp/expanded/file"
        );
        assert_eq!(
            expand_env("${TRASH_LIFECYCLE_TEST_DIR}/file"),
            "/tmp/expanded/file"
        );
        assert_eq!(
            expand_env("%TRASH_LIFECYCLE_TEST_DIR%/file"),
            "/tmp/expanded/file"
        );
        env::remove_var("TRASH_LIFECYCLE_TEST_DIR");
    }

    #[test]
    fn validation_does_not_touch_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created");
        let _ = validator().validate(&path, PathIntent::Delete);
        assert!(!path.exists());
    }

    /// Reports every write probe as a busy file, standing in for a platform
    /// lock that is hard to provoke with a real filesystem.
    #[cfg(unix)]
    struct BusyFs;

    #[cfg(unix)]
    impl FileSystem for BusyFs {
        fn now(&self) -> std::time::SystemTime {
            RealFileSystem.now()
        }
        fn exists(&self, path: &Path) -> bool {
            RealFileSystem.exists(path)
        }
        fn metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
            RealFileSystem.metadata(path)
        }
        fn symlink_metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
            RealFileSystem.symlink_metadata(path)
        }
        fn read_link(&self, path: &Path) -> Result<PathBuf> {
            RealFileSystem.read_link(path)
        }
        fn create_dir_all(&self, path: &Path) -> Result<()> {
            RealFileSystem.create_dir_all(path)
        }
        fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
            RealFileSystem.write(path, data)
        }
        fn read_to_string(&self, path: &Path) -> Result<String> {
            RealFileSystem.read_to_string(path)
        }
        fn remove_file(&self, path: &Path) -> Result<()> {
            RealFileSystem.remove_file(path)
        }
        fn remove_dir_all(&self, path: &Path) -> Result<()> {
            RealFileSystem.remove_dir_all(path)
        }
        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            RealFileSystem.rename(from, to)
        }
        fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
            RealFileSystem.list_dir(path)
        }
        fn probe_write(&self, path: &Path) -> Result<()> {
            // EBUSY
            Err(TrashError::io(
                "open",
                path,
                std::io::Error::from_raw_os_error(16),
            ))
        }
    }

    #[cfg(unix)]
    #[test]
    fn busy_destination_rejects_restore_but_not_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.txt");
        std::fs::write(&path, b"x").unwrap();

        let v = PathValidator::new(&TrashConfig::default(), Arc::new(BusyFs));
        let err = v
            .validate(&path, PathIntent::RestoreDestination)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileInUse);
        assert!(v.validate(&path, PathIntent::Delete).is_ok());
    }
}

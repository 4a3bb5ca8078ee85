use std::path::PathBuf;

/// Default cap on concurrent batch operations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Files larger than this are trashed without a content checksum; restore
/// verification falls back to size-only for them.
pub const DEFAULT_CHECKSUM_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Longest accepted path, in bytes.
pub const DEFAULT_MAX_PATH_BYTES: usize = 4096;

/// Injected configuration for the trash lifecycle engines.
///
/// Every component receives its configuration explicitly; there is no
/// process-wide default instance.
#[derive(Debug, Clone)]
pub struct TrashConfig {
    /// Upper bound on concurrently executing batch units.
    pub max_concurrency: usize,
    /// Checksum size cutoff; `None` disables checksums entirely.
    pub checksum_max_bytes: Option<u64>,
    /// Confirm restored file size against the recorded size.
    pub verify_on_restore: bool,
    /// Longest accepted path, in bytes.
    pub max_path_bytes: usize,
    /// Deny-list roots in addition to the built-in system directories.
    pub extra_protected: Vec<PathBuf>,
    /// Identity recorded as `deleted_by` on new trash entries.
    pub deleted_by: String,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            checksum_max_bytes: Some(DEFAULT_CHECKSUM_MAX_BYTES),
            verify_on_restore: true,
            max_path_bytes: DEFAULT_MAX_PATH_BYTES,
            extra_protected: Vec::new(),
            deleted_by: current_user(),
        }
    }
}

impl TrashConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    pub fn with_checksum_max_bytes(mut self, limit: Option<u64>) -> Self {
        self.checksum_max_bytes = limit;
        self
    }

    pub fn with_verify_on_restore(mut self, verify: bool) -> Self {
        self.verify_on_restore = verify;
        self
    }

    pub fn with_protected(mut self, root: impl Into<PathBuf>) -> Self {
        self.extra_protected.push(root.into());
        self
    }

    pub fn with_deleted_by(mut self, identity: impl Into<String>) -> Self {
        self.deleted_by = identity.into();
        self
    }
}

/// Resolves the calling user's identity from the environment.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TrashConfig::default();
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.checksum_max_bytes, Some(DEFAULT_CHECKSUM_MAX_BYTES));
        assert!(config.verify_on_restore);
        assert!(config.extra_protected.is_empty());
    }

    #[test]
    fn concurrency_floor_is_one() {
        let config = TrashConfig::new().with_max_concurrency(0);
        assert_eq!(config.max_concurrency, 1);
    }
}

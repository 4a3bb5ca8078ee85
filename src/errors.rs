use std::io;
use std::path::PathBuf;

/// Classified failure category for a trash operation.
///
/// The kind is assigned at the point of origin (the filesystem call site)
/// from the underlying `io::Error`, never by inspecting error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileNotFound,
    PermissionDenied,
    ProtectedPath,
    InvalidPath,
    PathTraversal,
    IsDirectory,
    FileInUse,
    DiskFull,
    NetworkError,
    Timeout,
    Cancelled,
    VerificationFailed,
    UnsupportedPlatform,
    Unknown,
}

impl ErrorKind {
    /// Whether a caller may reasonably retry the failed operation.
    pub fn retryable(self) -> bool {
        matches!(
            self,
            Self::FileInUse | Self::DiskFull | Self::NetworkError | Self::Timeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileNotFound => "file-not-found",
            Self::PermissionDenied => "permission-denied",
            Self::ProtectedPath => "protected-path",
            Self::InvalidPath => "invalid-path",
            Self::PathTraversal => "path-traversal",
            Self::IsDirectory => "is-directory",
            Self::FileInUse => "file-in-use",
            Self::DiskFull => "disk-full",
            Self::NetworkError => "network-error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::VerificationFailed => "verification-failed",
            Self::UnsupportedPlatform => "unsupported-platform",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared error type for the trash lifecycle subsystem.
#[derive(thiserror::Error, Debug)]
pub enum TrashError {
    /// File system I/O failure, wrapped with the failing path and operation.
    #[error("{operation} failed for {}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        kind: ErrorKind,
        #[source]
        source: io::Error,
    },

    /// A path is malformed, empty, or too long for the current operation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A path contains traversal sequences, raw or encoded.
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// A path resolves into the protected deny-list.
    #[error("protected path: {}", .0.display())]
    ProtectedPath(PathBuf),

    /// Target is a directory and recursive deletion was not requested.
    #[error("{} is a directory; recursive deletion not requested", .0.display())]
    IsDirectory(PathBuf),

    /// The unit of work was cancelled before it started.
    #[error("cancelled before operating on {}", .0.display())]
    Cancelled(PathBuf),

    /// Restored content does not match the recorded size.
    #[error("size mismatch after restoring {}: recorded {recorded} bytes, found {found}", path.display())]
    Verification {
        path: PathBuf,
        recorded: u64,
        found: u64,
    },

    /// No trash entry matches the given selector.
    #[error("no trash entry matches {0}")]
    NoSuchEntry(String),

    /// The metadata document could not be parsed or serialized.
    #[error("metadata store failure at {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Platform-specific behavior not available in this environment.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Internal invariant failure (thread pool construction and similar).
    #[error("internal error: {0}")]
    Internal(String),
}

impl TrashError {
    /// Wraps an `io::Error`, classifying it from the OS-level error.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let kind = classify_io(&source);
        Self::Io {
            operation,
            path: path.into(),
            kind,
            source,
        }
    }

    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The classified kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { kind, .. } => *kind,
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::PathTraversal(_) => ErrorKind::PathTraversal,
            Self::ProtectedPath(_) => ErrorKind::ProtectedPath,
            Self::IsDirectory(_) => ErrorKind::IsDirectory,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Verification { .. } => ErrorKind::VerificationFailed,
            Self::NoSuchEntry(_) => ErrorKind::FileNotFound,
            Self::Metadata { .. } => ErrorKind::Unknown,
            Self::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            Self::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    pub fn retryable(&self) -> bool {
        self.kind().retryable()
    }
}

/// Shared result alias for the crate.
pub type Result<T> = std::result::Result<T, TrashError>;

#[cfg(unix)]
const ENOSPC: i32 = 28;
#[cfg(unix)]
const EBUSY: i32 = 16;
#[cfg(unix)]
const ETXTBSY: i32 = 26;
#[cfg(unix)]
const ENETDOWN: i32 = 100;
#[cfg(unix)]
const ENETUNREACH: i32 = 101;
#[cfg(unix)]
const ESTALE: i32 = 116;

/// Maps an `io::Error` to the taxonomy using the stable `io::ErrorKind`
/// variants first and the raw OS error number for the rest.
pub fn classify_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => return ErrorKind::FileNotFound,
        io::ErrorKind::PermissionDenied => return ErrorKind::PermissionDenied,
        io::ErrorKind::TimedOut => return ErrorKind::Timeout,
        _ => {}
    }

    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        return match code {
            ENOSPC => ErrorKind::DiskFull,
            EBUSY | ETXTBSY => ErrorKind::FileInUse,
            ENETDOWN | ENETUNREACH | ESTALE => ErrorKind::NetworkError,
            _ => ErrorKind::Unknown,
        };
    }

    #[cfg(windows)]
    if let Some(code) = err.raw_os_error() {
        // ERROR_DISK_FULL, ERROR_HANDLE_DISK_FULL, ERROR_SHARING_VIOLATION,
        // ERROR_LOCK_VIOLATION.
        return match code {
            112 | 39 => ErrorKind::DiskFull,
            32 | 33 => ErrorKind::FileInUse,
            _ => ErrorKind::Unknown,
        };
    }

    ErrorKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::FileInUse.retryable());
        assert!(ErrorKind::DiskFull.retryable());
        assert!(ErrorKind::NetworkError.retryable());
        assert!(ErrorKind::Timeout.retryable());

        assert!(!ErrorKind::FileNotFound.retryable());
        assert!(!ErrorKind::PermissionDenied.retryable());
        assert!(!ErrorKind::ProtectedPath.retryable());
        assert!(!ErrorKind::Cancelled.retryable());
        assert!(!ErrorKind::VerificationFailed.retryable());
    }

    #[test]
    fn classify_from_io_kind() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(classify_io(&not_found), ErrorKind::FileNotFound);

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(classify_io(&denied), ErrorKind::PermissionDenied);

        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(classify_io(&timeout), ErrorKind::Timeout);
    }

    #[cfg(unix)]
    #[test]
    fn classify_from_errno() {
        assert_eq!(
            classify_io(&io::Error::from_raw_os_error(ENOSPC)),
            ErrorKind::DiskFull
        );
        assert_eq!(
            classify_io(&io::Error::from_raw_os_error(EBUSY)),
            ErrorKind::FileInUse
        );
        assert_eq!(
            classify_io(&io::Error::from_raw_os_error(ESTALE)),
            ErrorKind::NetworkError
        );
    }

    #[test]
    fn wrapped_error_keeps_path_and_kind() {
        let err = TrashError::io(
            "rename",
            "/tmp/some-file",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(err.to_string().contains("/tmp/some-file"));
        assert!(err.to_string().contains("rename"));
    }
}

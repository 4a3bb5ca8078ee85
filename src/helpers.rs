//! Shared helpers: identifier derivation, checksums, naming, classification
//! and human-readable rendering.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::{Result, TrashError};
use crate::models::FileKind;

/// Hex length of a derived trash entry identifier.
pub const ITEM_ID_LEN: usize = 16;

/// Timestamp format used for collision-backup filenames.
pub const BACKUP_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Derives the stable identifier for a trash entry from its original path
/// and modification time. Deterministic across re-reads on one machine.
pub fn derive_item_id(original_path: &Path, modified: SystemTime) -> String {
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(original_path.to_string_lossy().as_bytes());
    hasher.update(secs.to_le_bytes());
    let digest = hasher.finalize();
    let mut id = hex::encode(digest);
    id.truncate(ITEM_ID_LEN);
    id
}

/// Streams a file through SHA-256 and returns the hex digest.
///
/// Returns `None` without reading when the file is larger than `max_bytes`;
/// restore verification is size-only for such files.
pub fn compute_checksum(path: &Path, size: u64, max_bytes: Option<u64>) -> Result<Option<String>> {
    let limit = match max_bytes {
        Some(limit) => limit,
        None => return Ok(None),
    };
    if size > limit {
        return Ok(None);
    }

    let mut file = File::open(path).map_err(|err| TrashError::io("open", path, err))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|err| TrashError::io("read", path, err))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Some(hex::encode(hasher.finalize())))
}

/// Builds a deterministic, namespaced filename for trash-side collisions.
pub fn build_unique_basename(file_name: &str, pid: u32, counter: u64) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|v| v.to_str())
        .unwrap_or("item");
    format!("{base}.{pid}.{counter}")
}

/// fnmatch-style glob matching over a file name: `*` matches any run of
/// characters, `?` matches exactly one. Case-sensitive.
///
/// Iterative with single-point backtracking to the most recent `*`, so the
/// cost stays linear in pattern and name length.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = name.chars().collect();
    let mut p = 0usize;
    let mut t = 0usize;
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while t < text.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "svg", "tiff", "ico"];
const VIDEO_EXTS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "webm", "flv", "m4v"];
const AUDIO_EXTS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a", "opus"];
const DOCUMENT_EXTS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "txt", "md", "rtf", "csv"];
const ARCHIVE_EXTS: &[&str] = &["zip", "tar", "gz", "bz2", "xz", "zst", "7z", "rar"];
const CODE_EXTS: &[&str] = &["rs", "py", "c", "h", "cpp", "hpp", "go", "js", "ts", "java", "rb", "sh", "toml", "yaml", "yml", "json"];

/// Classifies content by extension; directories take precedence.
pub fn classify_kind(path: &Path, is_dir: bool) -> FileKind {
    if is_dir {
        return FileKind::Directory;
    }
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return FileKind::Other,
    };
    let ext = ext.as_str();
    if IMAGE_EXTS.contains(&ext) {
        FileKind::Image
    } else if VIDEO_EXTS.contains(&ext) {
        FileKind::Video
    } else if AUDIO_EXTS.contains(&ext) {
        FileKind::Audio
    } else if DOCUMENT_EXTS.contains(&ext) {
        FileKind::Document
    } else if ARCHIVE_EXTS.contains(&ext) {
        FileKind::Archive
    } else if CODE_EXTS.contains(&ext) {
        FileKind::Code
    } else {
        FileKind::Other
    }
}

/// Human readable size rendering shared across callers.
pub fn print_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut idx = 0usize;

    while value >= 1024.0 && idx < SUFFIXES.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }

    if idx == 0 {
        format!("{:.0} {}", value, SUFFIXES[idx])
    } else {
        format!("{:.1} {}", value, SUFFIXES[idx])
    }
}

/// Produces a human readable duration string.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;
    let rem_secs = secs % 60;
    let rem_mins = mins % 60;
    let rem_hours = hours % 24;

    if days > 0 {
        format!("{days}d {rem_hours:02}:{rem_mins:02}:{rem_secs:02}")
    } else if hours > 0 {
        format!("{hours}h {rem_mins:02}:{rem_secs:02}")
    } else if mins > 0 {
        format!("{mins}m {rem_secs:02}s")
    } else {
        format!("{secs}s")
    }
}

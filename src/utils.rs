//! Utility functions for Replisync
//!
//! File hashing, relative-path normalization and a few small helpers shared
//! by the scanner, the executor and the CLI.
//!
//! ## Relative paths
//!
//! Inventories are keyed by relative paths made only of normal components,
//! so that a key produced by scanning one root can be joined under another
//! root:
//!
//! ```rust,ignore
//! use crate::utils::{join_relative, normalize_relative};
//! use std::path::Path;
//!
//! let rel = normalize_relative(Path::new("/src/docs/a.txt"), Path::new("/src")).unwrap();
//! assert_eq!(rel, Path::new("docs/a.txt"));
//! assert_eq!(join_relative(Path::new("/replica"), &rel), Path::new("/replica/docs/a.txt"));
//! ```

use crate::error::{Result, ReplisyncError};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

/// Hash a file's content using SHA-256
///
/// Streams the file through an 8KB buffer and returns the digest as a
/// 64-character lowercase hexadecimal string.
///
/// # Errors
///
/// - [`ReplisyncError::Io`] if the file cannot be opened or read
pub fn hash_file_content(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192]; // 8KB buffer

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary data using SHA-256
///
/// Produces the same digest as [`hash_file_content`] for a file holding
/// `data`.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Make `path` relative to `base`, keeping only normal components
///
/// The result is byte-exact: names that are not valid UTF-8 survive
/// unchanged, so a key produced by scanning one root can be joined under
/// another root and still name the same file.
///
/// # Arguments
///
/// * `path` - Absolute path found while walking `base`
/// * `base` - Root the walk started from
///
/// # Returns
///
/// The path below `base`, with `.` components dropped.
///
/// # Errors
///
/// - [`ReplisyncError::Internal`] if `path` is not below `base`, is `base`
///   itself, or contains `..` or root components
pub fn normalize_relative(path: &Path, base: &Path) -> Result<PathBuf> {
    let relative = path.strip_prefix(base).map_err(|_| {
        ReplisyncError::internal(format!("Path {:?} is not relative to {:?}", path, base))
    })?;

    let mut normalized = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            other => {
                return Err(ReplisyncError::internal(format!(
                    "Unexpected component {:?} in {:?}",
                    other, path
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(ReplisyncError::internal(format!(
            "Path {:?} is the root itself",
            path
        )));
    }

    Ok(normalized)
}

/// Join a relative path under `root`
///
/// Only normal components are joined, so a relative path can never point
/// above `root`.
pub fn join_relative(root: &Path, relative: &Path) -> PathBuf {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Resolve a path to an absolute form that may not exist yet
///
/// `.` and `..` are resolved lexically first. The deepest existing ancestor
/// is then canonicalized (resolving symbolic links) and the missing
/// remainder appended, so two spellings of the same location compare equal.
///
/// # Errors
///
/// - [`ReplisyncError::Io`] if the current directory or an existing
///   ancestor cannot be resolved
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                lexical.pop();
            }
            Component::CurDir => {}
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize()?;
    for name in missing.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Convert a filesystem timestamp to UTC
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Remove directory if empty
///
/// # Returns
///
/// `true` if the directory was removed, `false` if it still has entries or
/// is not a directory.
///
/// # Errors
///
/// - [`ReplisyncError::Io`] if the directory cannot be listed or removed
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
        trace!("Removed empty directory: {:?}", path);
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Format bytes in human-readable form
///
/// ```rust,ignore
/// use crate::utils::format_bytes;
///
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

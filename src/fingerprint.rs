//! Content fingerprints for individual files
//!
//! A fingerprint is the SHA-256 digest of a file's full content. Hashing
//! never fails from the caller's point of view: read errors are reported as
//! warnings and turned into [`Fingerprint::Unavailable`], so one unreadable
//! file cannot stop a scan.

use crate::types::Fingerprint;
use crate::utils;
use std::path::Path;
use tracing::{trace, warn};

/// Fingerprint a file on disk
///
/// The file is opened read-only and streamed; it is never modified.
///
/// # Arguments
///
/// * `path` - File to hash
///
/// # Returns
///
/// [`Fingerprint::Digest`] with the lowercase hex SHA-256 of the content, or
/// [`Fingerprint::Unavailable`] if the file could not be opened or read.
///
/// # Examples
///
/// ```rust,no_run
/// use replisync::fingerprint::fingerprint_file;
/// use std::path::Path;
///
/// let fp = fingerprint_file(Path::new("./source/report.pdf"));
/// if !fp.is_available() {
///     println!("report.pdf will be re-copied next cycle");
/// }
/// ```
pub fn fingerprint_file(path: &Path) -> Fingerprint {
    match utils::hash_file_content(path) {
        Ok(digest) => {
            trace!("Hashed {:?}: {}", path, digest);
            Fingerprint::Digest(digest)
        }
        Err(e) => {
            warn!("Could not hash {:?}: {}", path, e);
            Fingerprint::Unavailable
        }
    }
}

/// Fingerprint content that is already in memory
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint::Digest(utils::hash_data(data))
}

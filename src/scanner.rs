//! Directory scanning for Replisync
//!
//! This module turns a directory tree into an [`Inventory`]: one
//! [`FileRecord`] per regular file reachable by recursive descent, with its
//! relative path, size, modification time and content fingerprint.
//! Relative paths are kept byte-exact, so names that are not valid UTF-8 are
//! recorded like any other.
//!
//! ## Behaviour
//!
//! - **Files only**: directories are walked but never recorded
//! - **Best effort**: a root that cannot be listed yields an empty,
//!   *degraded* inventory instead of an error; entries that fail below the
//!   root are skipped with a warning
//! - **Full rescan**: nothing is cached between scans
//! - **Exclusions**: optional glob patterns matched against relative paths;
//!   a matching directory is not descended into
//! - **Parallel hashing**: the walk itself is sequential, hashing runs on a
//!   rayon pool; the inventory is sorted afterwards so results do not depend
//!   on scheduling
//!
//! ## Example
//!
//! ```rust,no_run
//! use replisync::scanner::DirectoryScanner;
//! use std::path::PathBuf;
//!
//! let scanner = DirectoryScanner::new(PathBuf::from("./source"))
//!     .with_follow_symlinks(false);
//!
//! let inventory = scanner.scan();
//! println!("{} files, {} bytes", inventory.len(), inventory.total_size());
//! ```

use crate::fingerprint::fingerprint_file;
use crate::types::{FileRecord, Inventory};
use crate::utils;
use globset::GlobSet;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// A file found by the walk, waiting to be hashed
#[derive(Debug)]
struct Candidate {
    absolute_path: PathBuf,
    relative_path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Recursive scanner for one directory tree
///
/// ## Configuration Options
///
/// - `root`: directory to scan
/// - `excludes`: compiled glob patterns; matching files and directories are skipped
/// - `follow_symlinks`: whether the walk follows symbolic links
/// - `thread_pool`: pool used for hashing (the global rayon pool if unset)
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
    excludes: Option<Arc<GlobSet>>,
    follow_symlinks: bool,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl DirectoryScanner {
    /// Create a scanner with default settings
    ///
    /// No exclusions, symlinks are not followed, hashing uses the global
    /// rayon pool.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            excludes: None,
            follow_symlinks: false,
            thread_pool: None,
        }
    }

    /// Skip files and directories whose relative path matches `excludes`
    ///
    /// # Arguments
    ///
    /// * `excludes` - Compiled patterns, see [`compile_excludes`](crate::config::compile_excludes)
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use replisync::config::compile_excludes;
    /// use replisync::scanner::DirectoryScanner;
    /// use std::path::PathBuf;
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let excludes = compile_excludes(&["*.tmp".to_string(), "target".to_string()])?;
    /// let scanner = DirectoryScanner::new(PathBuf::from("./source"))
    ///     .with_excludes(Arc::new(excludes));
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_excludes(mut self, excludes: Arc<GlobSet>) -> Self {
        self.excludes = Some(excludes);
        self
    }

    /// Set symbolic link following behavior
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Hash files on a dedicated thread pool
    pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    /// Root directory of this scanner
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the tree and build an inventory
    ///
    /// Walks the whole tree below the root, skipping excluded entries, and
    /// hashes every regular file it finds.
    ///
    /// # Returns
    ///
    /// An [`Inventory`] sorted by relative path. Never fails: an unlistable
    /// root produces a degraded, empty inventory and an error diagnostic.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use replisync::scanner::DirectoryScanner;
    /// use std::path::PathBuf;
    ///
    /// let inventory = DirectoryScanner::new(PathBuf::from("./replica")).scan();
    /// if inventory.is_degraded() {
    ///     eprintln!("replica root could not be listed");
    /// }
    /// for record in &inventory {
    ///     println!("{} {}", record.display_path(), record.fingerprint);
    /// }
    /// ```
    ///
    /// # File Processing
    ///
    /// For each entry found, the scanner:
    /// 1. Checks it against the exclude patterns (excluded directories are not entered)
    /// 2. Skips anything that is not a regular file, including unfollowed links
    /// 3. Reads size and modification time
    /// 4. Computes the content fingerprint on the hashing pool
    pub fn scan(&self) -> Inventory {
        let start = Instant::now();

        if let Err(e) = fs::read_dir(&self.root) {
            error!("Cannot list directory {:?}: {}", self.root, e);
            return Inventory::degraded(self.root.clone());
        }

        let candidates = self.collect_candidates();
        let records: Vec<FileRecord> = match &self.thread_pool {
            Some(pool) => pool.install(|| {
                candidates
                    .par_iter()
                    .map(|c| self.build_record(c))
                    .collect::<Vec<_>>()
            }),
            None => candidates
                .par_iter()
                .map(|c| self.build_record(c))
                .collect(),
        };

        let inventory = Inventory::from_records(self.root.clone(), records);
        debug!(
            "Scanned {:?}: {} files ({}) in {:?}",
            self.root,
            inventory.len(),
            utils::format_bytes(inventory.total_size()),
            start.elapsed()
        );
        inventory
    }

    /// Walk the tree and collect every regular file that is not excluded
    fn collect_candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded_entry(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error under {:?}: {}", self.root, e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                trace!("Skipping non-file entry {:?}", entry.path());
                continue;
            }

            let relative_path = match utils::normalize_relative(entry.path(), &self.root) {
                Ok(rel) => rel,
                Err(e) => {
                    warn!("Skipping {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Cannot read metadata for {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            candidates.push(Candidate {
                absolute_path: entry.into_path(),
                relative_path,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        candidates
    }

    fn is_excluded_entry(&self, entry: &DirEntry) -> bool {
        let Some(excludes) = &self.excludes else {
            return false;
        };
        if entry.depth() == 0 {
            return false;
        }
        match utils::normalize_relative(entry.path(), &self.root) {
            Ok(rel) => {
                let excluded = excludes.is_match(&rel);
                if excluded {
                    trace!("Excluded {:?}", rel);
                }
                excluded
            }
            Err(_) => false,
        }
    }

    fn build_record(&self, candidate: &Candidate) -> FileRecord {
        FileRecord::new(
            candidate.relative_path.clone(),
            candidate.absolute_path.clone(),
            utils::system_time_to_utc(candidate.modified),
            candidate.size,
            fingerprint_file(&candidate.absolute_path),
        )
    }
}

//! Core data types used throughout the Replisync library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **File System State**: `Fingerprint`, `FileRecord`, `Inventory` - one scan of one tree
//! - **Planning**: `ReconciliationPlan` - the add/update/delete sets for one cycle
//! - **Outcomes**: `OperationOutcome`, `ExecutionReport`, `CycleReport` - what a cycle did
//! - **Driver state**: `CyclePhase`
//!
//! Nothing here is persisted between cycles. Every cycle rebuilds its
//! inventories from scratch and throws its plan away once executed.
//!
//! ## Examples
//!
//! ```rust
//! use replisync::types::Fingerprint;
//!
//! let a = Fingerprint::Digest("ab12".to_string());
//! let b = Fingerprint::Digest("AB12".to_string());
//! assert!(a.matches(&b));
//!
//! // An unavailable fingerprint never matches, not even itself
//! assert!(!Fingerprint::Unavailable.matches(&Fingerprint::Unavailable));
//! assert_eq!(Fingerprint::Unavailable.to_string(), "ERROR");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Content identity of a single file
///
/// Either a hexadecimal digest of the file's full content, or
/// `Unavailable` when the file could not be read. The unavailable case
/// renders as the `"ERROR"` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fingerprint {
    /// Hex-encoded content digest
    Digest(String),
    /// Hashing failed (file vanished, locked, unreadable)
    Unavailable,
}

impl Fingerprint {
    /// Text used for a fingerprint that could not be computed
    pub const ERROR_SENTINEL: &'static str = "ERROR";

    /// Whether two fingerprints identify the same content
    ///
    /// Digests compare case-insensitively. `Unavailable` never matches
    /// anything, so a file that cannot be hashed is always treated as
    /// changed.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        match (self, other) {
            (Fingerprint::Digest(a), Fingerprint::Digest(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    /// Whether a digest was computed
    pub fn is_available(&self) -> bool {
        matches!(self, Fingerprint::Digest(_))
    }

    /// String form of the fingerprint
    pub fn as_str(&self) -> &str {
        match self {
            Fingerprint::Digest(hex) => hex,
            Fingerprint::Unavailable => Self::ERROR_SENTINEL,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file discovered during a scan
///
/// `relative_path` holds only normal components and is kept byte-exact, so
/// names that are not valid UTF-8 still key, copy and delete correctly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the scanned root
    pub relative_path: PathBuf,
    /// Full path at scan time
    pub absolute_path: PathBuf,
    /// Last modification time (informational only)
    pub last_modified: DateTime<Utc>,
    /// File size in bytes (informational only)
    pub size: u64,
    /// Content fingerprint
    pub fingerprint: Fingerprint,
}

impl FileRecord {
    /// Create a new file record
    pub fn new(
        relative_path: impl Into<PathBuf>,
        absolute_path: impl Into<PathBuf>,
        last_modified: DateTime<Utc>,
        size: u64,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
            last_modified,
            size,
            fingerprint,
        }
    }

    /// Relative path rendered with `/` separators for logs and events
    ///
    /// Lossy for names that are not valid UTF-8; never use it as a key.
    pub fn display_path(&self) -> String {
        display_relative(&self.relative_path)
    }
}

/// Render a relative path with `/` separators
///
/// Invalid UTF-8 sequences are replaced, so the result is for display only.
///
/// # Examples
///
/// ```rust
/// use replisync::types::display_relative;
/// use std::path::Path;
///
/// assert_eq!(display_relative(&Path::new("docs").join("a.txt")), "docs/a.txt");
/// ```
pub fn display_relative(relative_path: &Path) -> String {
    relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// All files found by one scan of one tree
///
/// Records are kept sorted by relative path, which makes everything derived
/// from an inventory deterministic regardless of walk or hashing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    /// Root that was scanned
    root: PathBuf,
    /// File records sorted by relative path
    records: Vec<FileRecord>,
    /// Set when the root itself could not be listed
    degraded: bool,
}

impl Inventory {
    /// Build an inventory from scanned records
    ///
    /// Records are sorted by relative path. If the same relative path is
    /// given more than once only the first record is kept.
    pub fn from_records(root: impl Into<PathBuf>, mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        records.dedup_by(|later, earlier| later.relative_path == earlier.relative_path);
        Self {
            root: root.into(),
            records,
            degraded: false,
        }
    }

    /// Empty inventory for a root that could not be listed
    pub fn degraded(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            records: Vec::new(),
            degraded: true,
        }
    }

    /// Root that was scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root could not be listed
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no files were found
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in relative-path order
    pub fn iter(&self) -> std::slice::Iter<'_, FileRecord> {
        self.records.iter()
    }

    /// Records in relative-path order
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Look up a record by relative path
    pub fn get(&self, relative_path: impl AsRef<Path>) -> Option<&FileRecord> {
        let key = relative_path.as_ref();
        self.records
            .binary_search_by(|r| r.relative_path.as_path().cmp(key))
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// Whether a relative path is present
    pub fn contains(&self, relative_path: impl AsRef<Path>) -> bool {
        self.get(relative_path).is_some()
    }

    /// Keyed lookup by relative path
    pub fn by_path(&self) -> HashMap<&Path, &FileRecord> {
        self.records
            .iter()
            .map(|r| (r.relative_path.as_path(), r))
            .collect()
    }

    /// Sum of all file sizes
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }

    /// Number of files whose fingerprint could not be computed
    pub fn unhashed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !r.fingerprint.is_available())
            .count()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a FileRecord;
    type IntoIter = std::slice::Iter<'a, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Add/update/delete sets derived from a source and a replica inventory
///
/// A relative path appears in at most one of the three sets. Each set is
/// ordered by relative path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Source records missing from the replica
    pub to_add: Vec<FileRecord>,
    /// Source records whose replica copy differs
    pub to_update: Vec<FileRecord>,
    /// Replica relative paths missing from the source
    pub to_delete: Vec<PathBuf>,
}

impl ReconciliationPlan {
    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of planned operations
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_delete.len()
    }

    /// Bytes that adds and updates will copy
    pub fn bytes_to_transfer(&self) -> u64 {
        self.to_add
            .iter()
            .chain(self.to_update.iter())
            .map(|r| r.size)
            .sum()
    }
}

/// Kind of replica mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Copy a new file into the replica
    Add,
    /// Overwrite an existing replica file
    Update,
    /// Remove a replica file
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::Add => "add",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Result of applying one planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    /// The operation succeeded
    Applied {
        /// What was done
        kind: OperationKind,
        /// Relative path of the file
        relative_path: PathBuf,
        /// Bytes copied (0 for deletes)
        bytes: u64,
    },
    /// The operation failed and was skipped
    Failed(OperationFailure),
}

impl OperationOutcome {
    /// Whether the operation succeeded
    pub fn is_applied(&self) -> bool {
        matches!(self, OperationOutcome::Applied { .. })
    }
}

/// A single operation that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// What was attempted
    pub kind: OperationKind,
    /// Relative path of the file
    pub relative_path: PathBuf,
    /// Human-readable reason
    pub reason: String,
}

/// Aggregated outcome of executing one plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Files copied in
    pub added: usize,
    /// Files overwritten
    pub updated: usize,
    /// Files removed
    pub deleted: usize,
    /// Bytes copied by adds and updates
    pub bytes_written: u64,
    /// Empty directories removed after deletions
    pub directories_pruned: usize,
    /// Operations that failed
    pub failures: Vec<OperationFailure>,
}

impl ExecutionReport {
    /// Fold one outcome into the report
    pub fn record(&mut self, outcome: OperationOutcome) {
        match outcome {
            OperationOutcome::Applied { kind, bytes, .. } => {
                match kind {
                    OperationKind::Add => self.added += 1,
                    OperationKind::Update => self.updated += 1,
                    OperationKind::Delete => self.deleted += 1,
                }
                self.bytes_written += bytes;
            }
            OperationOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    /// Number of successful operations
    pub fn applied(&self) -> usize {
        self.added + self.updated + self.deleted
    }

    /// Whether every operation succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Summary of one complete sync cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    /// Files found in the source
    pub source_files: usize,
    /// Files found in the replica before execution
    pub replica_files: usize,
    /// Source root could not be listed
    pub source_degraded: bool,
    /// Replica root could not be listed
    pub replica_degraded: bool,
    /// The plan that was executed
    pub plan: ReconciliationPlan,
    /// What execution did
    pub execution: ExecutionReport,
    /// Wall time of the cycle in milliseconds
    pub duration_ms: u64,
}

impl CycleReport {
    /// Whether the replica already matched the source
    pub fn was_in_sync(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Step the sync driver is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CyclePhase {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// Scanning the source tree
    ScanningSource,
    /// Scanning the replica tree
    ScanningReplica,
    /// Computing the plan
    Reconciling,
    /// Applying the plan to the replica
    Executing,
}

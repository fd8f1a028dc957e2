//! Applying a reconciliation plan to the replica tree
//!
//! The executor is the only component that mutates the replica. It works
//! through a [`ReconciliationPlan`] in a fixed order: adds, then updates,
//! then deletes. Each item is independent: a failure is recorded in the
//! [`ExecutionReport`], reported as a warning, and the next item is
//! processed.
//!
//! - **Add**: create missing parent directories, then copy the source file
//!   over the replica path
//! - **Links**: nothing is ever written through a symbolic link, so a link
//!   inside the replica can never redirect a copy outside of it
//! - **Update**: copy over the existing replica path; parents are not
//!   created
//! - **Delete**: remove the replica file, then prune parent directories that
//!   became empty (never the replica root)

use crate::error::{Result, ReplisyncError};
use crate::event_log::{EventSink, SyncEvent};
use crate::types::{
    display_relative, ExecutionReport, FileRecord, OperationFailure, OperationKind,
    OperationOutcome, ReconciliationPlan,
};
use crate::utils;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Applies plans to one replica root
pub struct Executor {
    replica_root: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("replica_root", &self.replica_root)
            .finish()
    }
}

impl Executor {
    /// Create an executor for `replica_root` reporting to `sink`
    ///
    /// # Arguments
    ///
    /// * `replica_root` - Directory all operations are applied under
    /// * `sink` - Receives an `ADDED`, `UPDATED` or `DELETED` event for every
    ///   successful operation
    pub fn new(replica_root: PathBuf, sink: Arc<dyn EventSink>) -> Self {
        Self { replica_root, sink }
    }

    /// Replica root this executor mutates
    pub fn replica_root(&self) -> &Path {
        &self.replica_root
    }

    /// Apply every operation of `plan`
    ///
    /// Adds run first, then updates, then deletes. Directories emptied by
    /// deletions are pruned afterwards, deepest first.
    ///
    /// # Arguments
    ///
    /// * `plan` - Operations computed by [`reconcile`](crate::reconcile::reconcile)
    ///
    /// # Returns
    ///
    /// An [`ExecutionReport`] with one entry per operation: a count for each
    /// success, an [`OperationFailure`] for each item that was skipped.
    ///
    /// Never fails as a whole. The executor never writes through a symbolic
    /// link: a link at an add or update target is replaced by a regular file,
    /// a link in the parent chain of an add is replaced by a real directory,
    /// and a link in the parent chain of an update or delete fails that item.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use replisync::{reconcile, DirectoryScanner, Executor, MemorySink};
    /// use std::path::PathBuf;
    /// use std::sync::Arc;
    ///
    /// let source = DirectoryScanner::new(PathBuf::from("./source")).scan();
    /// let replica = DirectoryScanner::new(PathBuf::from("./replica")).scan();
    /// let executor = Executor::new(PathBuf::from("./replica"), Arc::new(MemorySink::new()));
    ///
    /// let report = executor.execute(&reconcile(&source, &replica));
    /// for failure in &report.failures {
    ///     eprintln!("{} {:?}: {}", failure.kind, failure.relative_path, failure.reason);
    /// }
    /// ```
    pub fn execute(&self, plan: &ReconciliationPlan) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for record in &plan.to_add {
            report.record(self.apply(OperationKind::Add, &record.relative_path, || {
                self.copy_in(record, true)
            }));
        }

        for record in &plan.to_update {
            report.record(self.apply(OperationKind::Update, &record.relative_path, || {
                self.copy_in(record, false)
            }));
        }

        let mut touched_dirs = BTreeSet::new();
        for relative_path in &plan.to_delete {
            let outcome = self.apply(OperationKind::Delete, relative_path, || {
                self.remove(relative_path)
            });
            if outcome.is_applied() {
                self.collect_parents(relative_path, &mut touched_dirs);
            }
            report.record(outcome);
        }
        report.directories_pruned = self.prune_empty_dirs(touched_dirs);

        debug!(
            "Executed plan on {:?}: {} added, {} updated, {} deleted, {} failed",
            self.replica_root,
            report.added,
            report.updated,
            report.deleted,
            report.failures.len()
        );

        report
    }

    /// Run one operation and turn its result into an outcome
    fn apply<F>(&self, kind: OperationKind, relative_path: &Path, op: F) -> OperationOutcome
    where
        F: FnOnce() -> Result<u64>,
    {
        match op() {
            Ok(bytes) => {
                let event = match kind {
                    OperationKind::Add => SyncEvent::Added,
                    OperationKind::Update => SyncEvent::Updated,
                    OperationKind::Delete => SyncEvent::Deleted,
                };
                self.sink.emit(event, &display_relative(relative_path));
                OperationOutcome::Applied {
                    kind,
                    relative_path: relative_path.to_path_buf(),
                    bytes,
                }
            }
            Err(e) => {
                warn!("Failed to {} {:?}: {}", kind, relative_path, e);
                OperationOutcome::Failed(OperationFailure {
                    kind,
                    relative_path: relative_path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn copy_in(&self, record: &FileRecord, create_parents: bool) -> Result<u64> {
        let target = utils::join_relative(&self.replica_root, &record.relative_path);

        if let Some(parent) = target.parent() {
            self.ensure_real_dirs(parent, create_parents)?;
        }
        self.unlink_symlink(&target)?;

        let bytes = fs::copy(&record.absolute_path, &target).map_err(|source| {
            ReplisyncError::CopyFailed {
                from: record.absolute_path.clone(),
                to: target.clone(),
                source,
            }
        })?;
        trace!("Copied {:?} -> {:?} ({} bytes)", record.absolute_path, target, bytes);
        Ok(bytes)
    }

    fn remove(&self, relative_path: &Path) -> Result<u64> {
        let target = utils::join_relative(&self.replica_root, relative_path);
        if let Some(parent) = target.parent() {
            self.ensure_real_dirs(parent, false)?;
        }
        fs::remove_file(&target)
            .map_err(|source| ReplisyncError::DeleteFailed { path: target.clone(), source })?;
        trace!("Removed {:?}", target);
        Ok(0)
    }

    /// Check every directory from the replica root down to `dir`
    ///
    /// With `create` set, missing directories are created and symbolic links
    /// are replaced by real directories. Without it, either one is an error.
    /// A regular file in the chain is always an error.
    fn ensure_real_dirs(&self, dir: &Path, create: bool) -> Result<()> {
        if create && !self.replica_root.exists() {
            fs::create_dir_all(&self.replica_root)?;
        }
        let relative = dir.strip_prefix(&self.replica_root).map_err(|_| {
            ReplisyncError::internal(format!("{:?} is outside the replica {:?}", dir, self.replica_root))
        })?;

        let mut current = self.replica_root.clone();
        for component in relative.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    if !create {
                        return Err(ReplisyncError::Io(io::Error::other(format!(
                            "refusing to write through symbolic link {:?}",
                            current
                        ))));
                    }
                    fs::remove_file(&current)?;
                    fs::create_dir(&current)?;
                    debug!("Replaced symbolic link {:?} with a directory", current);
                }
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(ReplisyncError::Io(io::Error::other(format!(
                        "{:?} is not a directory",
                        current
                    ))));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                    fs::create_dir(&current)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Remove `target` if it is a symbolic link so a copy lands in the replica
    fn unlink_symlink(&self, target: &Path) -> Result<()> {
        match fs::symlink_metadata(target) {
            Ok(meta) if meta.file_type().is_symlink() => {
                fs::remove_file(target)?;
                debug!("Replaced symbolic link {:?} with a regular file", target);
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Record every ancestor directory of a deleted file below the root
    fn collect_parents(&self, relative_path: &Path, dirs: &mut BTreeSet<PathBuf>) {
        let target = utils::join_relative(&self.replica_root, relative_path);
        let mut parent = target.parent();
        while let Some(dir) = parent {
            if dir == self.replica_root || !dir.starts_with(&self.replica_root) {
                break;
            }
            dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
    }

    /// Remove directories left empty by deletions, deepest first
    fn prune_empty_dirs(&self, dirs: BTreeSet<PathBuf>) -> usize {
        let mut dirs: Vec<_> = dirs.into_iter().collect();
        dirs.sort_by(|a, b| b.components().count().cmp(&a.components().count()));

        let mut pruned = 0;
        for dir in dirs {
            match utils::remove_dir_if_empty(&dir) {
                Ok(true) => pruned += 1,
                Ok(false) => {}
                Err(e) => trace!("Could not remove directory {:?}: {}", dir, e),
            }
        }
        pruned
    }
}

//! # Replisync - one-way directory replication
//!
//! Keeps a replica directory tree identical to a source tree by polling on a
//! fixed interval.
//!
//! ## Overview
//!
//! Every cycle Replisync:
//! - Scans both trees into inventories of files keyed by relative path, each
//!   file identified by a SHA-256 content fingerprint
//! - Reconciles the two inventories into files to add, update and delete
//! - Applies those operations to the replica, one file at a time, so a
//!   single failure never aborts the rest of the batch
//! - Logs every decision and action as `[<timestamp>] <EVENT>: <detail>`
//!
//! The source tree is never modified. Nothing is persisted between cycles;
//! each cycle is a full rescan.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use replisync::ReplisyncBuilder;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let replisync = ReplisyncBuilder::new()
//!     .interval(Duration::from_secs(10))
//!     .log_file(PathBuf::from("./sync.log"))
//!     .build(PathBuf::from("./source"), PathBuf::from("./replica"))?;
//!
//! // A single cycle...
//! let report = replisync.run_cycle();
//! println!("{} added, {} updated, {} deleted",
//!     report.execution.added, report.execution.updated, report.execution.deleted);
//!
//! // ...or forever, on the configured interval
//! let runtime = tokio::runtime::Runtime::new()?;
//! runtime.block_on(Arc::new(replisync).run())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the pieces directly
//!
//! The engine is split into small, independently usable parts:
//!
//! ```rust,no_run
//! use replisync::{reconcile, DirectoryScanner, Executor, MemorySink};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let source = DirectoryScanner::new(PathBuf::from("./source")).scan();
//! let replica = DirectoryScanner::new(PathBuf::from("./replica")).scan();
//!
//! let plan = reconcile(&source, &replica);
//! println!("{} operations planned", plan.len());
//!
//! let executor = Executor::new(PathBuf::from("./replica"), Arc::new(MemorySink::new()));
//! let report = executor.execute(&plan);
//! assert_eq!(report.applied() + report.failures.len(), plan.len());
//! ```
//!
//! ## Error Handling
//!
//! Only building a [`Replisync`] can fail, with a [`ReplisyncError`]. Once
//! built, cycles never return errors: unreadable roots become empty
//! inventories, unreadable files get the `"ERROR"` fingerprint, and failed
//! copies or deletes are collected in the cycle's [`ExecutionReport`] and
//! retried naturally on the next cycle.
//!
//! ## Module Organization
//!
//! - [`fingerprint`]: content digests for single files
//! - [`scanner`]: recursive directory scanning into inventories
//! - [`reconcile`](mod@reconcile): inventory diffing
//! - [`executor`]: applying plans to the replica
//! - [`event_log`]: the user-facing event log
//! - [`config`]: configuration and argument parsing helpers
//! - [`types`]: common types and data structures
//! - [`error`]: error types and handling

// Public API modules
pub mod config;
pub mod error;
pub mod event_log;
pub mod executor;
pub mod fingerprint;
pub mod reconcile;
pub mod replisync;
pub mod scanner;
pub mod types;

// Internal modules (not part of public API)
mod utils;

// Re-export main types for convenience
pub use config::SyncConfig;
pub use error::{ReplisyncError, Result};
pub use event_log::{EventLog, EventSink, MemorySink, SyncEvent};
pub use executor::Executor;
pub use reconcile::reconcile;
pub use replisync::{Replisync, ReplisyncBuilder};
pub use scanner::DirectoryScanner;
pub use types::*;

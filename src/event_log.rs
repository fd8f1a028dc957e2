//! User-facing event log
//!
//! Every decision and action of a sync cycle is reported as one plain-text
//! line:
//!
//! ```text
//! [2026-10-19 14:03:27] ADDED: docs/readme.md
//! ```
//!
//! [`EventLog`] writes each line to standard output and appends it to a log
//! file. Diagnostics (hash failures, copy errors and so on) do not go through
//! this log; they are emitted with `tracing`.
//!
//! Other destinations can be plugged in through the [`EventSink`] trait;
//! [`MemorySink`] keeps events in memory and is handy for tests and for
//! embedding.

use crate::error::{Result, ReplisyncError};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Timestamp layout used in event lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kinds of events written to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    /// A cycle began
    SyncStarted,
    /// Source scan finished
    Source,
    /// Replica scan finished
    Replica,
    /// A file was planned for addition
    ToAdd,
    /// A file was planned for update
    ToUpdate,
    /// A file was planned for deletion
    ToDelete,
    /// A file was copied into the replica
    Added,
    /// A replica file was overwritten
    Updated,
    /// A replica file was removed
    Deleted,
    /// A cycle ended
    SyncFinished,
}

impl SyncEvent {
    /// Label written between the timestamp and the detail
    pub fn label(&self) -> &'static str {
        match self {
            SyncEvent::SyncStarted => "SYNC STARTED",
            SyncEvent::Source => "SOURCE",
            SyncEvent::Replica => "REPLICA",
            SyncEvent::ToAdd => "TO ADD",
            SyncEvent::ToUpdate => "TO UPDATE",
            SyncEvent::ToDelete => "TO DELETE",
            SyncEvent::Added => "ADDED",
            SyncEvent::Updated => "UPDATED",
            SyncEvent::Deleted => "DELETED",
            SyncEvent::SyncFinished => "SYNC FINISHED",
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Render one log line (without the trailing newline)
pub fn format_line(timestamp: &DateTime<Local>, event: SyncEvent, detail: &str) -> String {
    format!("[{}] {}: {}", timestamp.format(TIMESTAMP_FORMAT), event.label(), detail)
}

/// Destination for sync events
///
/// Implementations must never fail the caller; write problems are their own
/// to report.
pub trait EventSink: Send + Sync {
    /// Record one event
    fn emit(&self, event: SyncEvent, detail: &str);
}

/// Event log writing to standard output and an append-only file
pub struct EventLog {
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
    echo_stdout: bool,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("path", &self.path)
            .field("echo_stdout", &self.echo_stdout)
            .finish()
    }
}

impl EventLog {
    /// Open (or create) `path` for appending
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// - [`ReplisyncError::LogSink`] if the file cannot be opened
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ReplisyncError::LogSink {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file: Some(Mutex::new(file)),
            path: Some(path.to_path_buf()),
            echo_stdout: true,
        })
    }

    /// Event log that only writes to standard output
    pub fn stdout_only() -> Self {
        Self {
            file: None,
            path: None,
            echo_stdout: true,
        }
    }

    /// Turn the standard output copy on or off
    pub fn with_stdout(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    /// Path of the log file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: SyncEvent, detail: &str) {
        let line = format_line(&Local::now(), event, detail);

        if self.echo_stdout {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", line) {
                warn!("Could not write event to stdout: {}", e);
            }
        }

        if let Some(file) = &self.file {
            let mut file = file.lock();
            if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                warn!("Could not append event to {:?}: {}", self.path, e);
            }
        }
    }
}

/// In-memory event sink
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(SyncEvent, String)>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far
    pub fn events(&self) -> Vec<(SyncEvent, String)> {
        self.events.lock().clone()
    }

    /// Details of all events of one kind, in order
    pub fn details(&self, kind: SyncEvent) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(event, _)| *event == kind)
            .map(|(_, detail)| detail.clone())
            .collect()
    }

    /// Forget all recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SyncEvent, detail: &str) {
        self.events.lock().push((event, detail.to_string()));
    }
}

//! Configuration for a sync loop
//!
//! [`SyncConfig`] is the validated, serializable description of what to
//! sync and how. It is normally produced by [`crate::ReplisyncBuilder`],
//! which also turns it into a running [`crate::Replisync`].

use crate::error::{Result, ReplisyncError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of one source/replica pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Authoritative directory, never modified
    pub source_path: PathBuf,
    /// Directory kept identical to the source
    pub replica_path: PathBuf,
    /// Time between the starts of two cycles
    #[serde(with = "humantime_serde_compat")]
    pub interval: Duration,
    /// File the event log is appended to (stdout only when `None`)
    pub log_path: Option<PathBuf>,
    /// Glob patterns excluded from both trees
    pub exclude_patterns: Vec<String>,
    /// Number of threads used for hashing
    pub parallel_workers: usize,
    /// Whether directory walks follow symbolic links
    pub follow_symlinks: bool,
}

impl SyncConfig {
    /// Create a configuration with default options
    pub fn new(source_path: PathBuf, replica_path: PathBuf) -> Self {
        Self {
            source_path,
            replica_path,
            interval: Duration::from_secs(60),
            log_path: None,
            exclude_patterns: Vec::new(),
            parallel_workers: num_cpus::get(),
            follow_symlinks: false,
        }
    }

    /// Check the configuration for values that can never work
    ///
    /// Does not touch the filesystem; existence checks happen when the
    /// sync loop is built.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(ReplisyncError::InvalidInterval(
                humantime::format_duration(self.interval).to_string(),
            ));
        }
        if self.parallel_workers == 0 {
            return Err(ReplisyncError::invalid_config(
                "parallel_workers must be at least 1",
            ));
        }
        if self.source_path == self.replica_path {
            return Err(ReplisyncError::invalid_config(
                "source and replica must be different directories",
            ));
        }
        compile_excludes(&self.exclude_patterns)?;
        Ok(())
    }
}

/// Parse an interval given as a whole number of seconds
///
/// Leading and trailing whitespace is ignored. Zero, negative numbers and
/// anything that is not an integer are rejected.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ReplisyncError::InvalidInterval(raw.to_string())),
    }
}

/// Compile exclude patterns into a single matcher
pub fn compile_excludes(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ReplisyncError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ReplisyncError::InvalidPattern(e.to_string()))
}

/// Serialize durations as human-readable strings ("1m 30s")
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

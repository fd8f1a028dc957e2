//! Main Replisync implementation
//!
//! [`Replisync`] ties the scanner, the reconciler and the executor together
//! into sync cycles, and drives those cycles on a fixed interval.
//!
//! ## Cycle
//!
//! ```text
//! IDLE -> SCANNING_SOURCE -> SCANNING_REPLICA -> RECONCILING -> EXECUTING -> IDLE
//! ```
//!
//! A cycle always runs to completion. Cycles never overlap: [`Replisync::run_cycle`]
//! holds an internal guard for its whole duration, so concurrent callers
//! are serialized rather than interleaved against the same replica.
//!
//! ## Example
//!
//! ```rust,no_run
//! use replisync::ReplisyncBuilder;
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let replisync = ReplisyncBuilder::new()
//!     .interval(Duration::from_secs(30))
//!     .log_file(PathBuf::from("./sync.log"))
//!     .exclude_patterns(vec!["*.tmp".to_string()])
//!     .build(PathBuf::from("./source"), PathBuf::from("./replica"))?;
//!
//! let report = replisync.run_cycle();
//! println!("{} operations applied", report.execution.applied());
//! # Ok(())
//! # }
//! ```

use crate::config::{compile_excludes, SyncConfig};
use crate::error::{Result, ReplisyncError};
use crate::event_log::{EventLog, EventSink, SyncEvent};
use crate::executor::Executor;
use crate::reconcile::reconcile;
use crate::scanner::DirectoryScanner;
use crate::types::{display_relative, CycleReport, CyclePhase, Inventory};
use crate::utils;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// One-way sync loop between a source and a replica directory
pub struct Replisync {
    config: SyncConfig,
    source_scanner: DirectoryScanner,
    replica_scanner: DirectoryScanner,
    executor: Executor,
    sink: Arc<dyn EventSink>,
    /// Held for the full duration of a cycle
    cycle_guard: Mutex<()>,
    phase: RwLock<CyclePhase>,
    cycles_completed: AtomicU64,
}

impl std::fmt::Debug for Replisync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replisync")
            .field("config", &self.config)
            .field("phase", &*self.phase.read())
            .field("cycles_completed", &self.cycles_completed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Replisync {
    /// Configuration this instance was built from
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current step of the cycle state machine
    pub fn phase(&self) -> CyclePhase {
        *self.phase.read()
    }

    /// Number of cycles that ran to completion
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    /// Run one full scan-reconcile-execute cycle
    ///
    /// Blocks until the cycle is done. If another cycle is in progress this
    /// call waits for it to finish first.
    #[instrument(skip(self), fields(source = ?self.config.source_path, replica = ?self.config.replica_path))]
    pub fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_guard.lock();
        let cycle = self.cycles_completed.load(Ordering::SeqCst) + 1;
        let start = Instant::now();

        self.sink.emit(
            SyncEvent::SyncStarted,
            &format!(
                "cycle {} ({} -> {})",
                cycle,
                self.config.source_path.display(),
                self.config.replica_path.display()
            ),
        );

        self.set_phase(CyclePhase::ScanningSource);
        let source = self.source_scanner.scan();
        self.sink.emit(SyncEvent::Source, &describe_inventory(&source));

        self.set_phase(CyclePhase::ScanningReplica);
        let replica = self.replica_scanner.scan();
        self.sink.emit(SyncEvent::Replica, &describe_inventory(&replica));

        self.set_phase(CyclePhase::Reconciling);
        let plan = reconcile(&source, &replica);
        for record in &plan.to_add {
            self.sink.emit(SyncEvent::ToAdd, &record.display_path());
        }
        for record in &plan.to_update {
            self.sink.emit(SyncEvent::ToUpdate, &record.display_path());
        }
        for relative_path in &plan.to_delete {
            self.sink.emit(SyncEvent::ToDelete, &display_relative(relative_path));
        }

        self.set_phase(CyclePhase::Executing);
        let execution = self.executor.execute(&plan);

        self.set_phase(CyclePhase::Idle);
        let elapsed = start.elapsed();
        let duration = Duration::from_millis(elapsed.as_millis() as u64);

        self.sink.emit(
            SyncEvent::SyncFinished,
            &format!(
                "cycle {}: {} added, {} updated, {} deleted, {} failed ({}) in {}",
                cycle,
                execution.added,
                execution.updated,
                execution.deleted,
                execution.failures.len(),
                utils::format_bytes(execution.bytes_written),
                humantime::format_duration(duration)
            ),
        );

        if !execution.is_clean() {
            warn!(
                "Cycle {} finished with {} failed operation(s); they will be retried next cycle",
                cycle,
                execution.failures.len()
            );
        }

        self.cycles_completed.fetch_add(1, Ordering::SeqCst);

        CycleReport {
            cycle,
            source_files: source.len(),
            replica_files: replica.len(),
            source_degraded: source.is_degraded(),
            replica_degraded: replica.is_degraded(),
            plan,
            execution,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Run cycles forever: one immediately, then one per interval
    ///
    /// Only returns if a cycle task panics.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.run_cycles(None).await
    }

    /// Run at most `limit` cycles (unbounded when `None`)
    ///
    /// The first cycle starts immediately. A cycle that takes longer than
    /// the interval delays the next one instead of causing a burst of
    /// catch-up cycles.
    pub async fn run_cycles(self: Arc<Self>, limit: Option<u64>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Syncing {:?} -> {:?} every {}",
            self.config.source_path,
            self.config.replica_path,
            humantime::format_duration(self.config.interval)
        );

        let mut completed = 0u64;
        loop {
            if limit.is_some_and(|max| completed >= max) {
                return Ok(());
            }

            ticker.tick().await;

            let this = Arc::clone(&self);
            let report = tokio::task::spawn_blocking(move || this.run_cycle())
                .await
                .map_err(|e| ReplisyncError::internal(format!("sync cycle task failed: {}", e)))?;

            debug!(
                "Cycle {} took {}ms ({} planned operations)",
                report.cycle,
                report.duration_ms,
                report.plan.len()
            );
            completed += 1;
        }
    }

    fn set_phase(&self, phase: CyclePhase) {
        *self.phase.write() = phase;
    }
}

fn describe_inventory(inventory: &Inventory) -> String {
    if inventory.is_degraded() {
        return format!("{} (unreadable, treated as empty)", inventory.root().display());
    }
    let mut detail = format!(
        "{} ({} files, {})",
        inventory.root().display(),
        inventory.len(),
        utils::format_bytes(inventory.total_size())
    );
    let unhashed = inventory.unhashed_count();
    if unhashed > 0 {
        detail.push_str(&format!(", {} unreadable", unhashed));
    }
    detail
}

/// Builder for configuring Replisync instances
///
/// # Example
///
/// ```rust,no_run
/// use replisync::ReplisyncBuilder;
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let replisync = ReplisyncBuilder::new()
///     .parallel_workers(4)
///     .follow_symlinks(false)
///     .build(PathBuf::from("./source"), PathBuf::from("./replica"))?;
/// # Ok(())
/// # }
/// ```
pub struct ReplisyncBuilder {
    interval: Duration,
    log_path: Option<PathBuf>,
    exclude_patterns: Vec<String>,
    parallel_workers: usize,
    follow_symlinks: bool,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for ReplisyncBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplisyncBuilder")
            .field("interval", &self.interval)
            .field("log_path", &self.log_path)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("parallel_workers", &self.parallel_workers)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("custom_sink", &self.event_sink.is_some())
            .finish()
    }
}

impl ReplisyncBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(60),
            log_path: None,
            exclude_patterns: Vec::new(),
            parallel_workers: num_cpus::get(),
            follow_symlinks: false,
            event_sink: None,
        }
    }

    /// Set the time between cycle starts
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Append the event log to this file (in addition to stdout)
    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_path = Some(path);
        self
    }

    /// Set glob patterns excluded from both trees
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Set the number of hashing threads
    pub fn parallel_workers(mut self, count: usize) -> Self {
        self.parallel_workers = count;
        self
    }

    /// Set whether directory walks follow symbolic links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Send events to a custom sink instead of the stdout/file log
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Validate the configuration and prepare both trees
    ///
    /// # Errors
    ///
    /// - [`ReplisyncError::SourceNotFound`] if the source is missing or not a directory
    /// - [`ReplisyncError::ReplicaNotDirectory`] if the replica path is a file
    /// - [`ReplisyncError::InvalidInterval`], [`ReplisyncError::InvalidPattern`],
    ///   [`ReplisyncError::InvalidConfiguration`] for bad options
    /// - [`ReplisyncError::LogSink`] if the log file cannot be opened
    /// - [`ReplisyncError::Io`] if the replica directory cannot be created
    pub fn build(self, source_path: PathBuf, replica_path: PathBuf) -> Result<Replisync> {
        let config = SyncConfig {
            source_path,
            replica_path,
            interval: self.interval,
            log_path: self.log_path,
            exclude_patterns: self.exclude_patterns,
            parallel_workers: self.parallel_workers,
            follow_symlinks: self.follow_symlinks,
        };
        config.validate()?;

        if !config.source_path.is_dir() {
            return Err(ReplisyncError::SourceNotFound(config.source_path.clone()));
        }
        if config.replica_path.exists() && !config.replica_path.is_dir() {
            return Err(ReplisyncError::ReplicaNotDirectory(config.replica_path.clone()));
        }
        let source_resolved = utils::resolve_path(&config.source_path)?;
        let replica_resolved = utils::resolve_path(&config.replica_path)?;
        if replica_resolved.starts_with(&source_resolved) || source_resolved.starts_with(&replica_resolved) {
            return Err(ReplisyncError::invalid_config(format!(
                "source {:?} and replica {:?} must not be nested inside each other",
                config.source_path, config.replica_path
            )));
        }
        if !config.replica_path.exists() {
            info!("Creating replica directory {:?}", config.replica_path);
            fs::create_dir_all(&config.replica_path)?;
        }

        let sink: Arc<dyn EventSink> = match (self.event_sink, &config.log_path) {
            (Some(sink), _) => sink,
            (None, Some(path)) => Arc::new(EventLog::open(path)?),
            (None, None) => Arc::new(EventLog::stdout_only()),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_workers)
            .thread_name(|i| format!("replisync-hash-{}", i))
            .build()
            .map_err(|e| ReplisyncError::ThreadPool(e.to_string()))?;
        let pool = Arc::new(pool);
        let excludes = Arc::new(compile_excludes(&config.exclude_patterns)?);

        let source_scanner = DirectoryScanner::new(config.source_path.clone())
            .with_excludes(Arc::clone(&excludes))
            .with_follow_symlinks(config.follow_symlinks)
            .with_thread_pool(Arc::clone(&pool));
        let replica_scanner = DirectoryScanner::new(config.replica_path.clone())
            .with_excludes(excludes)
            .with_follow_symlinks(config.follow_symlinks)
            .with_thread_pool(pool);
        let executor = Executor::new(config.replica_path.clone(), Arc::clone(&sink));

        Ok(Replisync {
            config,
            source_scanner,
            replica_scanner,
            executor,
            sink,
            cycle_guard: Mutex::new(()),
            phase: RwLock::new(CyclePhase::Idle),
            cycles_completed: AtomicU64::new(0),
        })
    }
}

impl Default for ReplisyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

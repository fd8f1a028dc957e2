//! Integration tests for full sync scenarios
//!
//! Exercises the scanner, reconciler and executor together against real
//! directories, including the event log written to disk.

use super::{write_file, SyncFixture};
use ::replisync::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_add_and_delete_scenario() {
    let fx = SyncFixture::new();
    fx.write_source("a.txt", "H1");
    fx.write_source("b.txt", "H2");
    fx.write_replica("b.txt", "H2");
    fx.write_replica("c.txt", "H3");

    let plan = reconcile(&fx.scan_source(), &fx.scan_replica());
    let to_add: Vec<_> = plan.to_add.iter().map(|r| r.display_path()).collect();
    assert_eq!(to_add, vec!["a.txt"]);
    assert!(plan.to_update.is_empty());
    assert_eq!(plan.to_delete, vec![PathBuf::from("c.txt")]);

    let report = fx.replisync.run_cycle();
    assert_eq!(report.plan, plan);
    assert!(fx.replica.path().join("a.txt").exists());
    assert!(fx.replica.path().join("b.txt").exists());
    assert!(!fx.replica.path().join("c.txt").exists());
}

#[test]
fn test_changed_file_scenario() {
    let fx = SyncFixture::new();
    fx.write_source("b.txt", "version one");
    fx.replisync.run_cycle();

    fx.write_source("b.txt", "version two");
    let report = fx.replisync.run_cycle();
    let updated: Vec<_> = report.plan.to_update.iter().map(|r| r.display_path()).collect();
    assert_eq!(updated, vec!["b.txt"]);

    let source_fp = fx.scan_source().get("b.txt").unwrap().fingerprint.clone();
    let replica_fp = fx.scan_replica().get("b.txt").unwrap().fingerprint.clone();
    assert!(source_fp.matches(&replica_fp));
}

#[test]
fn test_idempotence() {
    let fx = SyncFixture::new();
    fx.write_source("one.txt", "1");
    fx.write_source("nested/two.txt", "2");
    fx.write_replica("stale/three.txt", "3");
    fx.write_replica("one.txt", "not one");

    let first = fx.replisync.run_cycle();
    assert!(!first.was_in_sync());

    let second = fx.replisync.run_cycle();
    assert!(second.plan.to_add.is_empty());
    assert!(second.plan.to_update.is_empty());
    assert!(second.plan.to_delete.is_empty());
    fx.assert_in_sync();
}

#[test]
fn test_round_trip_on_generated_project() {
    let fx = SyncFixture::new();
    let mut rng = StdRng::seed_from_u64(42);

    for i in 0..60 {
        let depth = rng.random_range(0..4);
        let mut rel = String::new();
        for d in 0..depth {
            rel.push_str(&format!("dir{}_{}/", d, rng.random_range(0..3)));
        }
        rel.push_str(&format!("file{}.dat", i));
        let size = rng.random_range(0..4096);
        let content: Vec<u8> = (0..size).map(|_| rng.random()).collect();
        fx.write_source(&rel, &content);
        if rng.random_bool(0.3) {
            fx.write_replica(&rel, b"outdated");
        }
    }
    for i in 0..15 {
        fx.write_replica(&format!("orphans/o{}.bin", i), b"orphan");
    }

    fx.replisync.run_cycle();
    fx.assert_in_sync();
    assert!(!fx.replica.path().join("orphans").exists());
}

#[test]
fn test_excluded_files_are_left_alone() {
    let fx = SyncFixture::with_builder(
        ReplisyncBuilder::new().exclude_patterns(vec!["*.tmp".to_string(), "cache".to_string()]),
    );
    fx.write_source("keep.txt", "k");
    fx.write_source("scratch.tmp", "s");
    fx.write_source("cache/blob", "b");
    fx.write_replica("local.tmp", "replica-only temp");

    let report = fx.replisync.run_cycle();
    assert_eq!(report.execution.added, 1);
    assert_eq!(report.execution.deleted, 0);
    assert!(fx.replica.path().join("keep.txt").exists());
    assert!(!fx.replica.path().join("scratch.tmp").exists());
    assert!(!fx.replica.path().join("cache").exists());
    assert!(fx.replica.path().join("local.tmp").exists());
}

#[test]
fn test_event_log_file_contents() {
    let source = TempDir::new().unwrap();
    let replica = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let log_path = logs.path().join("sync.log");
    write_file(source.path(), "new.txt", b"n");
    write_file(replica.path(), "gone.txt", b"g");

    let sink = Arc::new(EventLog::open(&log_path).unwrap().with_stdout(false));
    let replisync = ReplisyncBuilder::new()
        .event_sink(sink)
        .build(source.path().to_path_buf(), replica.path().to_path_buf())
        .unwrap();
    replisync.run_cycle();

    let content = fs::read_to_string(&log_path).unwrap();
    let events: Vec<&str> = content
        .lines()
        .map(|line| {
            assert!(line.starts_with('['), "bad line: {}", line);
            let after_ts = &line[line.find("] ").unwrap() + 2..];
            &after_ts[..after_ts.find(": ").unwrap()]
        })
        .collect();
    assert_eq!(
        events,
        vec![
            "SYNC STARTED",
            "SOURCE",
            "REPLICA",
            "TO ADD",
            "TO DELETE",
            "ADDED",
            "DELETED",
            "SYNC FINISHED"
        ]
    );
    assert!(content.contains("] TO ADD: new.txt\n"));
    assert!(content.contains("] DELETED: gone.txt\n"));
}

#[test]
fn test_log_file_via_builder_appends_across_instances() -> anyhow::Result<()> {
    let source = TempDir::new()?;
    let replica = TempDir::new()?;
    let logs = TempDir::new()?;
    let log_path = logs.path().join("sync.log");

    for _ in 0..2 {
        let replisync = ReplisyncBuilder::new()
            .log_file(log_path.clone())
            .build(source.path().to_path_buf(), replica.path().to_path_buf())?;
        replisync.run_cycle();
    }

    let content = fs::read_to_string(&log_path)?;
    assert_eq!(content.matches("SYNC STARTED").count(), 2);
    assert_eq!(content.matches("SYNC FINISHED").count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_driver_picks_up_changes_between_ticks() {
    let fx = SyncFixture::with_builder(ReplisyncBuilder::new().interval(Duration::from_millis(200)));
    fx.write_source("first.txt", "1");

    let replisync = Arc::new(fx.replisync);
    let driver = tokio::spawn(Arc::clone(&replisync).run_cycles(Some(2)));

    // Wait for the immediate first cycle
    while replisync.cycles_completed() < 1 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    write_file(fx.source.path(), "second.txt", b"2");

    driver.await.unwrap().unwrap();
    assert_eq!(replisync.cycles_completed(), 2);
    assert!(fx.replica.path().join("first.txt").exists());
    assert!(fx.replica.path().join("second.txt").exists());
}

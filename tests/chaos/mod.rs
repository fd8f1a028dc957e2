//! Chaos tests for Replisync
//!
//! Disturbs the trees between and during cycles to check that single
//! failures stay isolated and that the next cycle repairs the replica.

use super::{write_file, SyncFixture};
use ::replisync::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[test]
fn test_source_file_vanishes_before_copy() {
    let fx = SyncFixture::new();
    fx.write_source("stable.txt", "stays");
    fx.write_source("flaky.txt", "goes away");
    fx.write_source("zzz.txt", "after the flaky one");

    let plan = reconcile(&fx.scan_source(), &fx.scan_replica());
    assert_eq!(plan.to_add.len(), 3);

    fs::remove_file(fx.source.path().join("flaky.txt")).unwrap();

    let sink = Arc::new(MemorySink::new());
    let executor = Executor::new(fx.replica.path().to_path_buf(), sink.clone());
    let report = executor.execute(&plan);

    assert_eq!(report.added, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].relative_path, PathBuf::from("flaky.txt"));
    assert_eq!(report.failures[0].kind, OperationKind::Add);
    assert_eq!(sink.details(SyncEvent::Added), vec!["stable.txt", "zzz.txt"]);
    assert!(!fx.replica.path().join("flaky.txt").exists());

    // The next full cycle sees a consistent picture
    assert!(fx.replisync.run_cycle().was_in_sync());
}

#[test]
fn test_file_replaced_by_directory_recovers() {
    let fx = SyncFixture::new();
    fx.write_source("node", "now a file");
    fx.write_replica("node/child.txt", "was a directory");

    let first = fx.replisync.run_cycle();
    // The add collides with the directory still in place, the delete clears it
    assert_eq!(first.execution.failures.len(), 1);
    assert_eq!(first.execution.failures[0].kind, OperationKind::Add);
    assert_eq!(first.execution.deleted, 1);
    assert!(!fx.replica.path().join("node").exists());

    let second = fx.replisync.run_cycle();
    assert_eq!(second.execution.added, 1);
    assert!(second.execution.is_clean());
    assert_eq!(fx.replica_content("node"), Some(b"now a file".to_vec()));
}

#[test]
fn test_directory_replaced_by_file_recovers() {
    let fx = SyncFixture::new();
    fx.write_source("node/child.txt", "inside a directory");
    fx.write_replica("node", "blocking file");

    let first = fx.replisync.run_cycle();
    assert_eq!(first.execution.failures.len(), 1);
    assert_eq!(first.execution.deleted, 1);

    fx.replisync.run_cycle();
    fx.assert_in_sync();
}

#[test]
fn test_external_replica_mutations_are_repaired() {
    let fx = SyncFixture::new();
    let mut rng = StdRng::seed_from_u64(7);
    for i in 0..30 {
        fx.write_source(&format!("d{}/f{}.txt", i % 4, i), format!("content {}", i));
    }
    fx.replisync.run_cycle();
    fx.assert_in_sync();

    for round in 0..5 {
        let mut mutations = 0;
        for i in 0..30 {
            let rel = format!("d{}/f{}.txt", i % 4, i);
            match rng.random_range(0..6) {
                0 => {
                    let _ = fs::remove_file(fx.replica.path().join(&rel));
                    mutations += 1;
                }
                1 => {
                    fx.write_replica(&rel, "tampered");
                    mutations += 1;
                }
                2 => {
                    fx.write_replica(&format!("intruder{}_{}.bin", round, i), "extra");
                    mutations += 1;
                }
                _ => {}
            }
        }
        info!("Round {}: {} replica mutations", round, mutations);

        let report = fx.replisync.run_cycle();
        assert!(report.execution.is_clean());
        fx.assert_in_sync();
    }
}

#[test]
fn test_replica_root_removed_between_cycles() {
    let fx = SyncFixture::new();
    fx.write_source("a/b/c.txt", "c");
    fx.write_source("top.txt", "t");
    fx.replisync.run_cycle();

    fs::remove_dir_all(fx.replica.path()).unwrap();

    let report = fx.replisync.run_cycle();
    assert!(report.replica_degraded);
    assert_eq!(report.execution.added, 2);
    fx.assert_in_sync();
}

#[test]
fn test_source_churn_between_cycles() {
    let fx = SyncFixture::new();
    let mut rng = StdRng::seed_from_u64(1234);
    let mut live: Vec<String> = Vec::new();

    for round in 0..8 {
        for _ in 0..rng.random_range(1..6) {
            let rel = format!("r{}/n{}.txt", rng.random_range(0..3), rng.random_range(0..20));
            write_file(fx.source.path(), &rel, format!("round {}", round).as_bytes());
            live.push(rel);
        }
        if !live.is_empty() && rng.random_bool(0.5) {
            let victim = live.swap_remove(rng.random_range(0..live.len()));
            let _ = fs::remove_file(fx.source.path().join(&victim));
        }

        let report = fx.replisync.run_cycle();
        assert!(report.execution.is_clean(), "round {}: {:?}", round, report.execution.failures);
        fx.assert_in_sync();
    }
}

#[cfg(unix)]
#[test]
fn test_replica_symlink_is_replaced_not_followed() {
    let fx = SyncFixture::new();
    let outside = tempfile::TempDir::new().unwrap();
    let victim = outside.path().join("victim.txt");
    fs::write(&victim, "must survive").unwrap();
    fx.write_source("a.txt", "from source");
    std::os::unix::fs::symlink(&victim, fx.replica.path().join("a.txt")).unwrap();

    let first = fx.replisync.run_cycle();
    assert_eq!(first.execution.added, 1);
    assert!(first.execution.is_clean());

    let second = fx.replisync.run_cycle();
    assert!(second.was_in_sync());
    assert_eq!(fs::read_to_string(&victim).unwrap(), "must survive");
    assert_eq!(fx.replica_content("a.txt"), Some(b"from source".to_vec()));
}

#[cfg(unix)]
#[test]
fn test_replica_directory_symlink_is_replaced_not_followed() {
    let fx = SyncFixture::new();
    let outside = tempfile::TempDir::new().unwrap();
    fx.write_source("docs/guide.md", "guide");
    std::os::unix::fs::symlink(outside.path(), fx.replica.path().join("docs")).unwrap();

    fx.replisync.run_cycle();
    assert!(fx.replisync.run_cycle().was_in_sync());
    assert!(!outside.path().join("guide.md").exists());
    fx.assert_in_sync();
}

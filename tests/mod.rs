//! Main test module for Replisync
//!
//! This module includes all test suites:
//! - Integration tests for full sync scenarios
//! - Chaos tests for failure isolation and recovery
//! - Property-based tests for reconciliation invariants

pub mod chaos;
pub mod integration;

use ::replisync::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Source/replica pair with a recording sink
pub struct SyncFixture {
    pub source: TempDir,
    pub replica: TempDir,
    pub sink: Arc<MemorySink>,
    pub replisync: Replisync,
}

impl SyncFixture {
    pub fn new() -> Self {
        Self::with_builder(ReplisyncBuilder::new())
    }

    pub fn with_builder(builder: ReplisyncBuilder) -> Self {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        let sink = Arc::new(MemorySink::new());
        let replisync = builder
            .parallel_workers(2)
            .event_sink(sink.clone())
            .build(source.path().to_path_buf(), replica.path().to_path_buf())
            .unwrap();
        Self { source, replica, sink, replisync }
    }

    pub fn write_source(&self, rel: &str, content: impl AsRef<[u8]>) {
        write_file(self.source.path(), rel, content.as_ref());
    }

    pub fn write_replica(&self, rel: &str, content: impl AsRef<[u8]>) {
        write_file(self.replica.path(), rel, content.as_ref());
    }

    pub fn replica_content(&self, rel: &str) -> Option<Vec<u8>> {
        fs::read(self.replica.path().join(rel)).ok()
    }

    pub fn scan_source(&self) -> Inventory {
        DirectoryScanner::new(self.source.path().to_path_buf()).scan()
    }

    pub fn scan_replica(&self) -> Inventory {
        DirectoryScanner::new(self.replica.path().to_path_buf()).scan()
    }

    /// Assert the replica has exactly the source's paths and fingerprints
    pub fn assert_in_sync(&self) {
        let source = self.scan_source();
        let replica = self.scan_replica();
        let source_view: Vec<_> = source
            .iter()
            .map(|r| (r.relative_path.clone(), r.fingerprint.clone()))
            .collect();
        let replica_view: Vec<_> = replica
            .iter()
            .map(|r| (r.relative_path.clone(), r.fingerprint.clone()))
            .collect();
        assert_eq!(source_view, replica_view);
    }
}

pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[cfg(test)]
mod edge_cases {
    use super::*;

    #[test]
    fn test_empty_directories() {
        let fx = SyncFixture::new();
        let report = fx.replisync.run_cycle();
        assert!(report.was_in_sync());
        assert_eq!(report.source_files, 0);
        assert_eq!(report.replica_files, 0);
    }

    #[test]
    fn test_empty_source_dirs_are_not_replicated() {
        let fx = SyncFixture::new();
        fs::create_dir_all(fx.source.path().join("only/dirs/here")).unwrap();
        let report = fx.replisync.run_cycle();
        assert!(report.was_in_sync());
        assert!(!fx.replica.path().join("only").exists());
    }

    #[test]
    fn test_empty_files() {
        let fx = SyncFixture::new();
        fx.write_source("empty.txt", "");
        fx.replisync.run_cycle();
        assert_eq!(fx.replica_content("empty.txt"), Some(Vec::new()));
        assert!(fx.replisync.run_cycle().was_in_sync());
    }

    #[test]
    fn test_special_filenames() {
        let fx = SyncFixture::new();

        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file_with_underscores.txt",
            "file.with.dots.txt",
            "file@with#special$chars.txt",
            "file(with)parens.txt",
            "file[with]brackets.txt",
            "file{with}braces.txt",
        ];

        for name in &special_names {
            let path = fx.source.path().join(name);
            if fs::write(&path, format!("Content of {}", name)).is_err() {
                // Skip if OS doesn't support this filename
                continue;
            }
        }

        fx.replisync.run_cycle();

        for name in &special_names {
            if fx.source.path().join(name).exists() {
                let content = fs::read_to_string(fx.replica.path().join(name)).unwrap();
                assert_eq!(content, format!("Content of {}", name));
            }
        }
        fx.assert_in_sync();
    }

    #[test]
    fn test_unicode_filenames() {
        let fx = SyncFixture::new();

        let unicode_names = vec![
            "файл.txt",
            "文件.txt",
            "ファイル.txt",
            "αρχείο.txt",
            "🚀🌟💾.txt",
        ];

        for name in &unicode_names {
            let _ = fs::write(fx.source.path().join(name), name.as_bytes());
        }

        fx.replisync.run_cycle();
        fx.assert_in_sync();
        assert!(fx.replisync.run_cycle().was_in_sync());
    }

    #[test]
    fn test_deeply_nested_tree() {
        let fx = SyncFixture::new();
        let deep: Vec<String> = (0..25).map(|i| format!("level{}", i)).collect();
        let rel = format!("{}/leaf.txt", deep.join("/"));
        fx.write_source(&rel, "deep");

        let report = fx.replisync.run_cycle();
        assert_eq!(report.execution.added, 1);
        assert_eq!(fx.replica_content(&rel), Some(b"deep".to_vec()));
    }

    #[test]
    fn test_large_file_copied_intact() {
        let fx = SyncFixture::new();
        let content: Vec<u8> = (0..3_000_000u32).map(|i| (i * 7 % 256) as u8).collect();
        fx.write_source("big.bin", &content);

        let report = fx.replisync.run_cycle();
        assert_eq!(report.execution.bytes_written, content.len() as u64);
        assert_eq!(fx.replica_content("big.bin"), Some(content));
    }

    #[test]
    fn test_same_size_different_content_is_updated() {
        let fx = SyncFixture::new();
        fx.write_source("same.txt", "AAAA");
        fx.write_replica("same.txt", "BBBB");

        let report = fx.replisync.run_cycle();
        assert_eq!(report.execution.updated, 1);
        assert_eq!(fx.replica_content("same.txt"), Some(b"AAAA".to_vec()));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_filenames() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let fx = SyncFixture::new();
        let fresh = OsStr::from_bytes(b"bad\xffname.txt");
        let stale = OsStr::from_bytes(b"stale\xfe.txt");
        fs::write(fx.source.path().join(fresh), "odd").unwrap();
        fs::write(fx.replica.path().join(stale), "orphan").unwrap();

        let report = fx.replisync.run_cycle();
        assert_eq!(report.execution.added, 1);
        assert_eq!(report.execution.deleted, 1);
        assert_eq!(fs::read(fx.replica.path().join(fresh)).unwrap(), b"odd");
        assert!(!fx.replica.path().join(stale).exists());
        assert!(fx.replisync.run_cycle().was_in_sync());
    }
}

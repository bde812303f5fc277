//! Integration tests for treemirror
//!
//! Drives full cycles against real temporary trees: the basic mirroring
//! scenarios, idempotence and convergence, content-only changes, excludes,
//! dry runs, per-item failure isolation and the scheduler loop.

use ::treemirror::*;
use filetime::FileTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

/// Source and replica trees under one temporary directory
pub struct MirrorTestHarness {
    pub temp_dir: TempDir,
    pub source: PathBuf,
    pub replica: PathBuf,
    pub observer: Arc<RecordingObserver>,
}

/// What a path holds: a directory, or a file with its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Dir,
    File(Vec<u8>),
}

impl MirrorTestHarness {
    /// Create a harness with an empty source and no replica yet
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir(&source).unwrap();

        Self {
            temp_dir,
            source,
            replica,
            observer: Arc::new(RecordingObserver::new()),
        }
    }

    /// Engine with default settings and the recording observer
    pub fn engine(&self) -> MirrorEngine {
        self.builder().build(&self.source, &self.replica).unwrap()
    }

    /// Builder preloaded with the recording observer
    pub fn builder(&self) -> MirrorBuilder {
        MirrorBuilder::new().observer(self.observer.clone())
    }

    pub fn write_source(&self, relative: &str, content: impl AsRef<[u8]>) {
        write_file(&self.source.join(relative), content.as_ref());
    }

    pub fn write_replica(&self, relative: &str, content: impl AsRef<[u8]>) {
        write_file(&self.replica.join(relative), content.as_ref());
    }

    /// Whether the replica holds exactly the source's paths and bytes
    pub fn converged(&self) -> bool {
        tree_state(&self.source) == tree_state(&self.replica)
    }

    /// Build a random tree in the source
    pub fn generate_tree(&self, generator: &mut FileGenerator, config: TreeConfig) -> anyhow::Result<usize> {
        let mut files = 0;
        for depth in 1..=config.max_depth {
            for dir_idx in 0..config.dirs_per_level {
                let mut dir = self.source.clone();
                for level in 0..depth {
                    dir = dir.join(format!("dir_{}_{}", level, dir_idx));
                }
                fs::create_dir_all(&dir)?;

                for file_idx in 0..config.files_per_dir {
                    let content = generator.content(config.max_file_size);
                    fs::write(dir.join(format!("file_{}.bin", file_idx)), content)?;
                    files += 1;
                }
            }
        }
        Ok(files)
    }
}

/// Shape of a generated tree
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub dirs_per_level: usize,
    pub files_per_dir: usize,
    pub max_file_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            dirs_per_level: 3,
            files_per_dir: 4,
            max_file_size: 4096,
        }
    }
}

/// Deterministic random content
pub struct FileGenerator {
    pub rng: StdRng,
}

impl FileGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn content(&mut self, max_size: usize) -> Vec<u8> {
        let size = self.rng.random_range(0..=max_size);
        (0..size).map(|_| self.rng.random()).collect()
    }
}

pub fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Every path under `root` with what it holds
pub fn tree_state(root: &Path) -> BTreeMap<PathBuf, Entry> {
    let mut state = BTreeMap::new();
    if !root.exists() {
        return state;
    }
    for entry in walkdir::WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
        let value = if entry.file_type().is_dir() {
            Entry::Dir
        } else {
            Entry::File(fs::read(entry.path()).unwrap())
        };
        state.insert(relative, value);
    }
    state
}

#[cfg(test)]
mod scenarios {
    use super::*;

    #[test]
    fn test_empty_source_empties_replica() {
        let harness = MirrorTestHarness::new();
        harness.write_replica("old.txt", "stale");

        let report = harness.engine().run_cycle(1).into_result().unwrap();

        assert_eq!(report.files_deleted, 1);
        assert!(tree_state(&harness.replica).is_empty());
        assert!(harness.replica.is_dir());
    }

    #[test]
    fn test_new_nested_file_is_copied() {
        let harness = MirrorTestHarness::new();
        harness.write_source("a/b.txt", "hello");

        let report = harness.engine().run_cycle(1).into_result().unwrap();

        assert_eq!(report.dirs_created, 1);
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.bytes_copied, 5);
        assert!(harness.replica.join("a").is_dir());
        assert_eq!(fs::read_to_string(harness.replica.join("a/b.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_changed_file_is_overwritten() {
        let harness = MirrorTestHarness::new();
        harness.write_source("c.txt", "v2");
        harness.write_replica("c.txt", "v1");

        harness.engine().run_cycle(1).into_result().unwrap();

        assert_eq!(fs::read_to_string(harness.replica.join("c.txt")).unwrap(), "v2");
        assert_eq!(
            harness.observer.actions(),
            vec![SyncAction::CopyFile {
                path: "c.txt".into(),
                bytes: 2,
                replaced: true,
            }]
        );
    }

    #[test]
    fn test_identical_file_is_not_rewritten() {
        let harness = MirrorTestHarness::new();
        harness.write_source("d.txt", "same");
        harness.write_replica("d.txt", "same");

        let old = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(harness.replica.join("d.txt"), old).unwrap();

        let report = harness.engine().run_cycle(1).into_result().unwrap();

        assert_eq!(report.files_unchanged, 1);
        assert_eq!(report.total_actions(), 0);
        assert!(harness.observer.actions().is_empty());

        let mtime = FileTime::from_last_modification_time(
            &fs::metadata(harness.replica.join("d.txt")).unwrap(),
        );
        assert_eq!(mtime, old);
    }
}

#[cfg(test)]
mod properties {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_second_cycle_is_noop() {
        let harness = MirrorTestHarness::new();
        let mut generator = FileGenerator::new(42);
        let files = harness
            .generate_tree(&mut generator, TreeConfig::default())
            .unwrap();
        info!("Generated {} files", files);

        let engine = harness.engine();
        let first = engine.run_cycle(1).into_result().unwrap();
        assert_eq!(first.files_copied, files);

        harness.observer.clear();
        let second = engine.run_cycle(2).into_result().unwrap();
        assert_eq!(second.total_actions(), 0);
        assert_eq!(second.files_unchanged, files);
        assert!(harness.observer.actions().is_empty());
    }

    #[test]
    fn test_converges_from_divergent_replica() {
        let harness = MirrorTestHarness::new();
        let mut generator = FileGenerator::new(7);
        harness
            .generate_tree(&mut generator, TreeConfig::default())
            .unwrap();

        // Replica shares some paths, has stale content and extra trees
        harness.write_replica("dir_0_0/file_0.bin", "stale");
        harness.write_replica("dir_0_1/dir_1_1/extra.txt", "extra");
        harness.write_replica("orphan/deep/nested/file.txt", "orphan");
        harness.write_replica("top.txt", "top");

        let report = harness.engine().run_cycle(1).into_result().unwrap();

        assert!(harness.converged());
        assert_eq!(report.dirs_deleted, 1, "only the top-most orphan directory is deleted");
        assert_eq!(report.files_deleted, 2);
    }

    #[test]
    fn test_final_state_independent_of_replica_history() {
        let first = MirrorTestHarness::new();
        let second = MirrorTestHarness::new();
        for harness in [&first, &second] {
            harness.write_source("x/y.txt", "payload");
            harness.write_source("z.txt", "zz");
        }
        second.write_replica("x", "a file where a directory belongs");
        second.write_replica("z.txt/inner", "a directory where a file belongs");
        second.write_replica("junk/junk.txt", "junk");

        first.engine().run_cycle(1).into_result().unwrap();
        second.engine().run_cycle(1).into_result().unwrap();

        assert_eq!(tree_state(&first.replica), tree_state(&second.replica));
        assert!(second.converged());
    }

    #[test]
    fn test_same_size_same_mtime_different_content() {
        let harness = MirrorTestHarness::new();
        harness.write_source("c.txt", "AAAA");
        harness.write_replica("c.txt", "BBBB");

        let stamp = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(harness.source.join("c.txt"), stamp).unwrap();
        filetime::set_file_mtime(harness.replica.join("c.txt"), stamp).unwrap();

        let report = harness.engine().run_cycle(1).into_result().unwrap();

        assert_eq!(report.files_copied, 1);
        assert_eq!(fs::read_to_string(harness.replica.join("c.txt")).unwrap(), "AAAA");
    }

    #[test]
    fn test_source_is_never_modified() {
        let harness = MirrorTestHarness::new();
        harness.write_source("keep/a.txt", "a");
        harness.write_replica("other.txt", "o");
        let before = tree_state(&harness.source);

        harness.engine().run_cycle(1).into_result().unwrap();

        assert_eq!(tree_state(&harness.source), before);
    }

    #[test]
    fn test_type_changes_both_ways() {
        let harness = MirrorTestHarness::new();
        harness.write_source("node/child.txt", "child");
        harness.write_source("leaf", "leaf");
        harness.write_replica("node", "was a file");
        harness.write_replica("leaf/inside.txt", "was a directory");

        harness.engine().run_cycle(1).into_result().unwrap();
        assert!(harness.converged());
        assert!(harness.replica.join("node").is_dir());
        assert!(harness.replica.join("leaf").is_file());
    }
}

#[cfg(test)]
mod options {
    use super::*;

    #[test]
    fn test_excluded_paths_untouched() {
        let harness = MirrorTestHarness::new();
        harness.write_source("keep.txt", "keep");
        harness.write_source("build/out.o", "object");
        harness.write_source("notes.tmp", "scratch");
        harness.write_replica("local.tmp", "replica-only scratch");

        let engine = harness
            .builder()
            .exclude_patterns(vec!["*.tmp".to_string(), "build".to_string()])
            .build(&harness.source, &harness.replica)
            .unwrap();
        engine.run_cycle(1).into_result().unwrap();

        assert!(harness.replica.join("keep.txt").exists());
        assert!(!harness.replica.join("build").exists());
        assert!(!harness.replica.join("notes.tmp").exists());
        assert_eq!(
            fs::read_to_string(harness.replica.join("local.tmp")).unwrap(),
            "replica-only scratch"
        );
    }

    #[test]
    fn test_excluded_entry_goes_with_stale_directory() {
        let harness = MirrorTestHarness::new();
        harness.write_replica("stale/keep.tmp", "scratch");
        harness.write_replica("kept.tmp", "scratch");

        let engine = harness
            .builder()
            .exclude_patterns(vec!["*.tmp".to_string()])
            .build(&harness.source, &harness.replica)
            .unwrap();
        let report = engine.run_cycle(1).into_result().unwrap();

        assert_eq!(report.dirs_deleted, 1);
        assert!(!harness.replica.join("stale").exists());
        assert!(harness.replica.join("kept.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_follow_symlinks_mirrors_linked_directory() {
        let harness = MirrorTestHarness::new();
        let shared = harness.temp_dir.path().join("shared");
        write_file(&shared.join("inner.txt"), b"shared content");
        std::os::unix::fs::symlink(&shared, harness.source.join("linked")).unwrap();

        let engine = harness
            .builder()
            .follow_symlinks(true)
            .build(&harness.source, &harness.replica)
            .unwrap();
        engine.run_cycle(1).into_result().unwrap();

        let linked = harness.replica.join("linked");
        assert!(fs::symlink_metadata(&linked).unwrap().is_dir());
        assert_eq!(fs::read(linked.join("inner.txt")).unwrap(), b"shared content");

        let report = engine.run_cycle(2).into_result().unwrap();
        assert_eq!(report.total_actions(), 0);
        assert_eq!(report.files_unchanged, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_follow_symlinks_never_enters_replica_links() {
        let harness = MirrorTestHarness::new();
        harness.write_source("data/new.txt", "new");

        let precious = harness.temp_dir.path().join("precious");
        write_file(&precious.join("keep_me.txt"), b"outside the replica");
        fs::create_dir_all(&harness.replica).unwrap();
        std::os::unix::fs::symlink(&precious, harness.replica.join("data")).unwrap();

        let engine = harness
            .builder()
            .follow_symlinks(true)
            .build(&harness.source, &harness.replica)
            .unwrap();
        let report = engine.run_cycle(1).into_result().unwrap();

        assert_eq!(report.files_deleted, 1);
        assert_eq!(
            fs::read_to_string(precious.join("keep_me.txt")).unwrap(),
            "outside the replica"
        );
        assert!(!precious.join("new.txt").exists());

        let data = fs::symlink_metadata(harness.replica.join("data")).unwrap();
        assert!(!data.file_type().is_symlink());
        assert!(data.is_dir());
        assert!(harness.converged());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let harness = MirrorTestHarness::new();
        harness.write_source("new/file.txt", "new");
        harness.write_replica("gone.txt", "gone");
        let before = tree_state(&harness.replica);

        let engine = harness
            .builder()
            .dry_run(true)
            .build(&harness.source, &harness.replica)
            .unwrap();
        let report = engine.run_cycle(1).into_result().unwrap();

        assert!(report.dry_run);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.dirs_created, 1);
        assert_eq!(report.files_copied, 1);
        assert_eq!(tree_state(&harness.replica), before);
        assert!(harness.observer.actions().is_empty());
    }

    #[test]
    fn test_plan_matches_cycle() {
        let harness = MirrorTestHarness::new();
        harness.write_source("a/b/c.txt", "c");
        harness.write_replica("x/y.txt", "y");

        let engine = harness.engine();
        let plan = engine.plan().unwrap();
        let report = engine.run_cycle(1).into_result().unwrap();

        assert_eq!(plan.total_operations(), report.total_actions());
        assert!(engine.plan().unwrap().is_empty());
    }
}

#[cfg(test)]
mod failures {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_item_failure_does_not_stop_phase() {
        use std::os::unix::fs::PermissionsExt;

        let harness = MirrorTestHarness::new();
        harness.write_replica("locked/victim.txt", "cannot delete me");
        harness.write_source("locked/other.txt", "other");
        harness.write_source("free/a.txt", "a");
        harness.write_source("free/b.txt", "b");

        let locked = harness.replica.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore directory permissions
        if fs::write(locked.join("probe"), "").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            eprintln!("Skipping: directory permissions not enforced");
            return;
        }

        let outcome = harness.engine().run_cycle(1);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(outcome.error(), Some(MirrorError::PartialFailure { failed: 2 })));
        let report = outcome.report();
        let failed: Vec<(ActionKind, PathBuf)> = report
            .failures
            .iter()
            .map(|f| (f.action, f.path.clone()))
            .collect();
        assert!(failed.contains(&(ActionKind::DeleteFile, PathBuf::from("locked/victim.txt"))));
        assert!(failed.contains(&(ActionKind::CopyFile, PathBuf::from("locked/other.txt"))));

        assert_eq!(fs::read_to_string(harness.replica.join("free/a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(harness.replica.join("free/b.txt")).unwrap(), "b");

        // Unblocked, the next cycle finishes the job
        harness.engine().run_cycle(2).into_result().unwrap();
        assert!(harness.converged());
    }

    #[test]
    fn test_missing_source_reported_not_raised() {
        let harness = MirrorTestHarness::new();
        let engine = harness.engine();
        fs::remove_dir(&harness.source).unwrap();

        let outcome = engine.run_cycle(1);
        assert!(!outcome.is_success());
        assert!(matches!(outcome.error(), Some(MirrorError::Scan { .. })));
        assert_eq!(harness.observer.cycles_finished(), 1);
    }
}

#[cfg(test)]
mod scheduling {
    use super::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    async fn wait_for(observer: &RecordingObserver, predicate: impl Fn(&[ObservedEvent]) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while !predicate(observer.events().as_slice()) {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for cycles");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn finished(events: &[ObservedEvent], success: bool) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ObservedEvent::CycleFinished { success: s, .. } if *s == success))
            .count()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_scheduler_survives_failed_cycles() {
        let harness = MirrorTestHarness::new();
        let engine = Arc::new(harness.engine());
        fs::remove_dir(&harness.source).unwrap();

        let handle = SyncScheduler::new(engine, Duration::from_millis(20))
            .unwrap()
            .start();

        wait_for(&harness.observer, |events| finished(events, false) >= 3).await;
        assert!(!handle.is_finished());

        harness.write_source("back.txt", "back");
        wait_for(&harness.observer, |events| finished(events, true) >= 1).await;

        let cycles = handle.shutdown().await.unwrap();
        assert!(cycles >= 4);
        assert_eq!(fs::read_to_string(harness.replica.join("back.txt")).unwrap(), "back");
    }

    #[tokio::test]
    async fn test_scheduler_picks_up_changes() {
        let harness = MirrorTestHarness::new();
        harness.write_source("one.txt", "1");
        let engine = Arc::new(harness.engine());

        let handle = SyncScheduler::new(engine, Duration::from_millis(20))
            .unwrap()
            .start();
        wait_for(&harness.observer, |events| finished(events, true) >= 1).await;

        harness.write_source("two.txt", "2");
        fs::remove_file(harness.source.join("one.txt")).unwrap();
        wait_for(&harness.observer, |_| !harness.replica.join("one.txt").exists()).await;
        wait_for(&harness.observer, |_| harness.replica.join("two.txt").exists()).await;

        handle.shutdown().await.unwrap();
        assert!(harness.converged());
    }

    #[tokio::test]
    async fn test_stop_is_cooperative() {
        let harness = MirrorTestHarness::new();
        let engine = Arc::new(harness.engine());

        let handle = SyncScheduler::new(engine, Duration::from_secs(3600))
            .unwrap()
            .start();
        wait_for(&harness.observer, |events| finished(events, true) >= 1).await;

        handle.stop();
        let cycles = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("scheduler did not stop within the wait")
            .unwrap();
        assert_eq!(cycles, 1);
    }
}

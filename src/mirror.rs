//! Mirror engine: one scan-diff-apply cycle
//!
//! ## Overview
//!
//! [`MirrorEngine`] owns the two roots and everything a cycle needs: a
//! [`PathCatalog`] per root, the [`ContentComparator`] used by the differ,
//! and the [`SyncObserver`] that receives every event. A cycle walks through
//! [`CyclePhase`]s in a fixed order:
//!
//! 1. **Scanning**: snapshot source and replica, compute the [`SyncDiff`].
//!    A scan error ends the cycle here.
//! 2. **Deleting**: remove replica files absent from the source, then replica
//!    directories absent from the source (recursively). Files go first so a
//!    directory removal never trips over a half-emptied tree.
//! 3. **CreatingDirs**: create missing directories, parents first.
//! 4. **Copying**: copy new and changed files atomically (temp file plus
//!    rename), overwriting the replica copy.
//!
//! Failures in phases 2 to 4 are isolated per item. The failed item is
//! recorded in the [`CycleReport`], reported to the observer, and the phase
//! moves on to the next item. A cycle with failures ends as
//! [`CycleOutcome::Failed`] with [`MirrorError::PartialFailure`].
//!
//! No state survives a cycle; each one recomputes the full comparison.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use treemirror::MirrorBuilder;
//!
//! # fn main() -> treemirror::Result<()> {
//! let engine = MirrorBuilder::new()
//!     .exclude_patterns(vec!["*.tmp".to_string()])
//!     .build("./source", "./replica")?;
//!
//! let outcome = engine.run_cycle(1);
//! println!("{} changes", outcome.report().total_actions());
//! # Ok(())
//! # }
//! ```

use crate::catalog::{build_exclude_set, DirectorySnapshot, PathCatalog};
use crate::compare::{ContentComparator, DigestComparator};
use crate::config;
use crate::diff::{SyncDiff, TreeDiffer};
use crate::error::{MirrorError, Result};
use crate::observer::{SyncObserver, TracingObserver};
use crate::types::{ActionKind, CycleOutcome, CyclePhase, CycleReport, ItemFailure, SyncAction};
use crate::utils;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace};

/// Applies source changes to the replica, one cycle at a time
pub struct MirrorEngine {
    source_root: PathBuf,
    replica_root: PathBuf,
    source_catalog: PathCatalog,
    replica_catalog: PathCatalog,
    comparator: Arc<dyn ContentComparator>,
    observer: Arc<dyn SyncObserver>,
    dry_run: bool,
}

impl std::fmt::Debug for MirrorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorEngine")
            .field("source_root", &self.source_root)
            .field("replica_root", &self.replica_root)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl MirrorEngine {
    /// Source root
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Replica root
    pub fn replica_root(&self) -> &Path {
        &self.replica_root
    }

    /// Whether the engine only plans changes
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Observer receiving this engine's events
    pub fn observer(&self) -> &Arc<dyn SyncObserver> {
        &self.observer
    }

    /// Create the replica root (and its parents) if it is missing
    ///
    /// Returns `Ok(true)` if the directory was created. In dry-run mode
    /// nothing is created and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// [`MirrorError::CreateDir`] if the directory cannot be created.
    pub fn ensure_replica_root(&self) -> Result<bool> {
        if self.dry_run || self.replica_root.is_dir() {
            return Ok(false);
        }

        fs::create_dir_all(&self.replica_root).map_err(|source| MirrorError::CreateDir {
            path: self.replica_root.clone(),
            source,
        })?;
        debug!("Created replica root {:?}", self.replica_root);
        Ok(true)
    }

    /// Snapshot both roots and compute the diff without changing anything
    ///
    /// # Errors
    ///
    /// [`MirrorError::Scan`] if either root cannot be enumerated. A missing
    /// replica root in dry-run mode counts as an empty replica.
    pub fn plan(&self) -> Result<SyncDiff> {
        let (_, _, diff) = self.scan()?;
        Ok(diff)
    }

    fn scan(&self) -> Result<(DirectorySnapshot, DirectorySnapshot, SyncDiff)> {
        let source = self.source_catalog.snapshot()?;
        let replica = if self.dry_run && !self.replica_root.exists() {
            DirectorySnapshot::empty(self.replica_root.clone())
        } else {
            self.replica_catalog.snapshot()?
        };

        let diff = TreeDiffer::new(self.comparator.as_ref()).diff(&source, &replica);
        Ok((source, replica, diff))
    }

    /// Run one full cycle
    ///
    /// Never panics on filesystem errors and never returns early with an
    /// `Err`: everything that goes wrong is captured in the outcome. The
    /// outcome is also handed to the observer before returning.
    #[instrument(skip(self), fields(source = ?self.source_root, replica = ?self.replica_root))]
    pub fn run_cycle(&self, sequence: u64) -> CycleOutcome {
        let started = Instant::now();
        let mut report = CycleReport::new(sequence, self.dry_run);
        self.observer.cycle_started(sequence);

        let outcome = match self.apply_cycle(&mut report) {
            Ok(()) => {
                report.finish(started);
                CycleOutcome::from_report(report)
            }
            Err(error) => {
                report.finish(started);
                CycleOutcome::Failed { error, report }
            }
        };

        self.enter(CyclePhase::Idle);
        self.observer.cycle_finished(&outcome);
        outcome
    }

    fn apply_cycle(&self, report: &mut CycleReport) -> Result<()> {
        self.ensure_replica_root()?;

        self.enter(CyclePhase::Scanning);
        let (_source, replica, diff) = self.scan()?;

        report.files_unchanged = diff.unchanged;
        report.comparison_failures = diff.comparison_failures.len();
        for failure in &diff.comparison_failures {
            self.observer.comparison_failed(&failure.path, &failure.message);
        }

        if self.dry_run {
            for action in diff.planned_actions(&replica) {
                report.record(&action);
                self.observer.planned(&action);
            }
            return Ok(());
        }

        self.enter(CyclePhase::Deleting);
        self.delete_files(&diff.files_to_delete, report);
        self.delete_dirs(&diff.dirs_to_delete, report);

        self.enter(CyclePhase::CreatingDirs);
        self.create_dirs(&diff.dirs_to_create, report);

        self.enter(CyclePhase::Copying);
        self.copy_files(&diff.files_to_copy, report);

        Ok(())
    }

    fn delete_files(&self, files: &[PathBuf], report: &mut CycleReport) {
        for relative in files {
            let target = self.replica_root.join(relative);
            match utils::remove_file_if_exists(&target) {
                Ok(true) => self.applied(SyncAction::DeleteFile { path: relative.clone() }, report),
                Ok(false) => trace!("Already gone: {:?}", target),
                Err(source) => self.failed(
                    ActionKind::DeleteFile,
                    relative,
                    MirrorError::Delete { path: target, source },
                    report,
                ),
            }
        }
    }

    fn delete_dirs(&self, dirs: &[PathBuf], report: &mut CycleReport) {
        for relative in dirs {
            let target = self.replica_root.join(relative);
            match utils::remove_dir_all_if_exists(&target) {
                Ok(true) => self.applied(SyncAction::DeleteDir { path: relative.clone() }, report),
                Ok(false) => trace!("Already gone: {:?}", target),
                Err(source) => self.failed(
                    ActionKind::DeleteDir,
                    relative,
                    MirrorError::Delete { path: target, source },
                    report,
                ),
            }
        }
    }

    fn create_dirs(&self, dirs: &[PathBuf], report: &mut CycleReport) {
        for relative in dirs {
            let target = self.replica_root.join(relative);
            if target.is_dir() {
                continue;
            }
            match fs::create_dir_all(&target) {
                Ok(()) => self.applied(SyncAction::CreateDir { path: relative.clone() }, report),
                Err(source) => self.failed(
                    ActionKind::CreateDir,
                    relative,
                    MirrorError::CreateDir { path: target, source },
                    report,
                ),
            }
        }
    }

    fn copy_files(&self, files: &[PathBuf], report: &mut CycleReport) {
        for relative in files {
            let from = self.source_root.join(relative);
            let to = self.replica_root.join(relative);
            let replaced = to.is_file();

            match utils::copy_atomic(&from, &to) {
                Ok(bytes) => self.applied(
                    SyncAction::CopyFile {
                        path: relative.clone(),
                        bytes,
                        replaced,
                    },
                    report,
                ),
                Err(source) => self.failed(
                    ActionKind::CopyFile,
                    relative,
                    MirrorError::Copy { path: to, source },
                    report,
                ),
            }
        }
    }

    fn enter(&self, phase: CyclePhase) {
        self.observer.phase_changed(phase);
    }

    fn applied(&self, action: SyncAction, report: &mut CycleReport) {
        report.record(&action);
        self.observer.action(&action);
    }

    fn failed(&self, kind: ActionKind, relative: &Path, error: MirrorError, report: &mut CycleReport) {
        let failure = ItemFailure::new(kind, relative.to_path_buf(), &error);
        self.observer.item_failed(&failure);
        report.failures.push(failure);
    }
}

/// Builder for [`MirrorEngine`]
///
/// # Default Values
///
/// - `exclude_patterns`: empty
/// - `follow_symlinks`: false
/// - `comparator`: [`DigestComparator`] with the size shortcut
/// - `observer`: [`TracingObserver`]
/// - `dry_run`: false
pub struct MirrorBuilder {
    exclude_patterns: Vec<String>,
    follow_symlinks: bool,
    comparator: Option<Arc<dyn ContentComparator>>,
    observer: Option<Arc<dyn SyncObserver>>,
    dry_run: bool,
}

impl MirrorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            follow_symlinks: false,
            comparator: None,
            observer: None,
            dry_run: false,
        }
    }

    /// Set exclude patterns
    ///
    /// Glob patterns matched against relative paths and file names on both
    /// sides. Excluded entries are never copied and never deleted.
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Set whether to descend into symlinked directories of the source
    ///
    /// Without this, source links to directories are skipped. Links in the
    /// replica are never followed; they are deleted and replaced.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set the content comparator
    pub fn comparator(mut self, comparator: Arc<dyn ContentComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Set the observer receiving cycle events
    pub fn observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Plan changes without touching the replica
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build the engine for `source` and `replica`
    ///
    /// # Errors
    ///
    /// - [`MirrorError::SourceMissing`] if the source is not a directory
    /// - [`MirrorError::InvalidConfiguration`] if the roots overlap
    /// - [`MirrorError::InvalidPattern`] if an exclude pattern is malformed
    pub fn build(self, source: impl AsRef<Path>, replica: impl AsRef<Path>) -> Result<MirrorEngine> {
        let (source_root, replica_root) = config::check_roots(source.as_ref(), replica.as_ref())?;
        let excludes = build_exclude_set(&self.exclude_patterns)?;

        let source_catalog = PathCatalog::new(source_root.clone())
            .with_excludes(excludes.clone())
            .with_follow_symlinks(self.follow_symlinks);
        // Links in the replica are entries to replace, never trees to enter
        let replica_catalog = PathCatalog::new(replica_root.clone())
            .with_excludes(excludes)
            .with_follow_symlinks(false)
            .with_dir_links_as_files(true);

        Ok(MirrorEngine {
            source_root,
            replica_root,
            source_catalog,
            replica_catalog,
            comparator: self
                .comparator
                .unwrap_or_else(|| Arc::new(DigestComparator::new())),
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            dry_run: self.dry_run,
        })
    }
}

impl Default for MirrorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

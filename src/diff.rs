//! Tree diff between a source snapshot and a replica snapshot
//!
//! ## Overview
//!
//! [`TreeDiffer`] turns two [`DirectorySnapshot`]s into a [`SyncDiff`], the
//! four operation sets a cycle applies:
//!
//! - `dirs_to_delete`  = replica dirs  - source dirs
//! - `files_to_delete` = replica files - source files
//! - `dirs_to_create`  = source dirs   - replica dirs
//! - `files_to_copy`   = source files missing from the replica, or present
//!   with different content
//!
//! Set membership is by relative path only. File equality is decided by the
//! [`ContentComparator`]; size and mtime never make two files equal.
//!
//! Both snapshots are taken before the diff starts and are not re-read, so
//! all four sets describe the same pair of trees.
//!
//! ## Reductions
//!
//! - `dirs_to_delete` keeps only top-most directories, since the recursive
//!   removal of a parent takes its children along.
//! - `files_to_delete` drops files that live below a directory in
//!   `dirs_to_delete` for the same reason.
//!
//! ## Comparison failures
//!
//! If the comparator cannot read a pair, the file is scheduled for copy and
//! the failure is recorded in `comparison_failures`. Copying either fixes the
//! replica or fails with its own per-item error, and the next cycle compares
//! again.
//!
//! ## Example
//!
//! ```rust,no_run
//! use treemirror::catalog::PathCatalog;
//! use treemirror::compare::DigestComparator;
//! use treemirror::diff::TreeDiffer;
//!
//! # fn main() -> treemirror::Result<()> {
//! let source = PathCatalog::new("./source").snapshot()?;
//! let replica = PathCatalog::new("./replica").snapshot()?;
//! let comparator = DigestComparator::new();
//!
//! let diff = TreeDiffer::new(&comparator).diff(&source, &replica);
//! println!("{} files to copy", diff.files_to_copy.len());
//! # Ok(())
//! # }
//! ```

use crate::catalog::DirectorySnapshot;
use crate::compare::ContentComparator;
use crate::types::SyncAction;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A comparison that failed and was promoted to a copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonFailure {
    /// Relative path of the file
    pub path: PathBuf,
    /// Rendered error
    pub message: String,
}

/// Operation sets for one cycle
///
/// Every vector is sorted by path, which puts parents before children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDiff {
    /// Top-most replica directories absent from the source
    pub dirs_to_delete: Vec<PathBuf>,
    /// Replica files absent from the source (outside deleted directories)
    pub files_to_delete: Vec<PathBuf>,
    /// Source directories absent from the replica
    pub dirs_to_create: Vec<PathBuf>,
    /// Source files that are new or changed
    pub files_to_copy: Vec<PathBuf>,
    /// Files present on both sides with identical content
    pub unchanged: usize,
    /// Comparisons that failed; each path is also in `files_to_copy`
    pub comparison_failures: Vec<ComparisonFailure>,
}

impl SyncDiff {
    /// Whether the replica already matches the source
    pub fn is_empty(&self) -> bool {
        self.dirs_to_delete.is_empty()
            && self.files_to_delete.is_empty()
            && self.dirs_to_create.is_empty()
            && self.files_to_copy.is_empty()
    }

    /// Number of operations in the diff
    pub fn total_operations(&self) -> usize {
        self.dirs_to_delete.len()
            + self.files_to_delete.len()
            + self.dirs_to_create.len()
            + self.files_to_copy.len()
    }

    /// The diff as actions in application order
    ///
    /// File deletions, then directory deletions, then directory creations,
    /// then copies. Copies carry `bytes: 0` since nothing was written yet.
    pub fn planned_actions(&self, replica: &DirectorySnapshot) -> Vec<SyncAction> {
        let mut actions = Vec::with_capacity(self.total_operations());
        actions.extend(
            self.files_to_delete
                .iter()
                .map(|path| SyncAction::DeleteFile { path: path.clone() }),
        );
        actions.extend(
            self.dirs_to_delete
                .iter()
                .map(|path| SyncAction::DeleteDir { path: path.clone() }),
        );
        actions.extend(
            self.dirs_to_create
                .iter()
                .map(|path| SyncAction::CreateDir { path: path.clone() }),
        );
        actions.extend(self.files_to_copy.iter().map(|path| SyncAction::CopyFile {
            path: path.clone(),
            bytes: 0,
            replaced: replica.files.contains(path),
        }));
        actions
    }
}

/// Computes a [`SyncDiff`] from two snapshots
pub struct TreeDiffer<'a> {
    comparator: &'a dyn ContentComparator,
}

impl<'a> TreeDiffer<'a> {
    /// Create a differ using `comparator` for file equality
    pub fn new(comparator: &'a dyn ContentComparator) -> Self {
        Self { comparator }
    }

    /// Diff `source` against `replica`
    ///
    /// Never fails: comparison errors are folded into the copy set.
    pub fn diff(&self, source: &DirectorySnapshot, replica: &DirectorySnapshot) -> SyncDiff {
        let mut diff = SyncDiff::default();

        let stale_dirs: Vec<PathBuf> = replica
            .dirs
            .iter()
            .filter(|dir| !source.dirs.contains(*dir))
            .cloned()
            .collect();
        diff.dirs_to_delete = top_most(stale_dirs);

        let doomed: HashSet<&Path> = diff.dirs_to_delete.iter().map(PathBuf::as_path).collect();
        diff.files_to_delete = replica
            .files
            .iter()
            .filter(|file| !source.files.contains(*file))
            .filter(|file| !file.ancestors().skip(1).any(|a| doomed.contains(a)))
            .cloned()
            .collect();
        diff.files_to_delete.sort();

        diff.dirs_to_create = source
            .dirs
            .iter()
            .filter(|dir| !replica.dirs.contains(*dir))
            .cloned()
            .collect();
        diff.dirs_to_create.sort();

        let mut candidates: Vec<&PathBuf> = source.files.iter().collect();
        candidates.sort();
        for file in candidates {
            if !replica.files.contains(file) {
                diff.files_to_copy.push(file.clone());
                continue;
            }

            match self
                .comparator
                .same_content(&source.absolute(file), &replica.absolute(file))
            {
                Ok(true) => diff.unchanged += 1,
                Ok(false) => diff.files_to_copy.push(file.clone()),
                Err(e) => {
                    debug!("Comparison of {:?} failed, scheduling copy: {}", file, e);
                    diff.comparison_failures.push(ComparisonFailure {
                        path: file.clone(),
                        message: e.to_string(),
                    });
                    diff.files_to_copy.push(file.clone());
                }
            }
        }

        debug!(
            "Diff: {} dirs to delete, {} files to delete, {} dirs to create, {} files to copy, {} unchanged",
            diff.dirs_to_delete.len(),
            diff.files_to_delete.len(),
            diff.dirs_to_create.len(),
            diff.files_to_copy.len(),
            diff.unchanged
        );

        diff
    }
}

/// Keep only paths that have no ancestor in the list
fn top_most(mut dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    // Component-wise ordering places every directory right before its
    // descendants.
    dirs.sort();
    let mut kept: Vec<PathBuf> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        if kept.last().is_some_and(|parent| dir.starts_with(parent)) {
            continue;
        }
        kept.push(dir);
    }
    kept
}

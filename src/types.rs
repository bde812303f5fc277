//! Core data types shared across the mirror components
//!
//! ## Overview
//!
//! - **Cycle state**: [`CyclePhase`] tracks where a cycle is in its
//!   `Idle -> Scanning -> Deleting -> CreatingDirs -> Copying -> Idle` run.
//! - **Actions**: [`SyncAction`] is one change applied (or planned) against
//!   the replica; [`ItemFailure`] is one change that could not be applied.
//! - **Results**: [`CycleReport`] accumulates counters for a cycle and
//!   [`CycleOutcome`] wraps it as success or failure.
//!
//! ## Examples
//!
//! ```rust
//! use treemirror::types::{CycleOutcome, CycleReport};
//!
//! let report = CycleReport::new(1, false);
//! let outcome = CycleOutcome::Success(report);
//! assert!(outcome.is_success());
//! assert_eq!(outcome.report().total_actions(), 0);
//! ```

use crate::error::{MirrorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Phase of a mirror cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// No cycle in progress
    Idle,
    /// Snapshotting both roots and computing the diff
    Scanning,
    /// Removing replica entries absent from the source
    Deleting,
    /// Creating directories missing from the replica
    CreatingDirs,
    /// Copying new and changed files
    Copying,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Scanning => "scanning",
            CyclePhase::Deleting => "deleting",
            CyclePhase::CreatingDirs => "creating directories",
            CyclePhase::Copying => "copying",
        };
        f.write_str(name)
    }
}

/// Kind of change made to the replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Removal of a replica file
    DeleteFile,
    /// Recursive removal of a replica directory
    DeleteDir,
    /// Creation of a replica directory
    CreateDir,
    /// Copy of a source file into the replica
    CopyFile,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::DeleteFile => "delete file",
            ActionKind::DeleteDir => "delete directory",
            ActionKind::CreateDir => "create directory",
            ActionKind::CopyFile => "copy file",
        };
        f.write_str(name)
    }
}

/// A single change against the replica, keyed by relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncAction {
    /// File removed from the replica
    DeleteFile {
        /// Relative path
        path: PathBuf,
    },
    /// Directory removed from the replica with all its contents
    DeleteDir {
        /// Relative path
        path: PathBuf,
    },
    /// Directory created in the replica
    CreateDir {
        /// Relative path
        path: PathBuf,
    },
    /// File copied from the source into the replica
    CopyFile {
        /// Relative path
        path: PathBuf,
        /// Bytes written (0 when only planned)
        bytes: u64,
        /// Whether an existing replica file was overwritten
        replaced: bool,
    },
}

impl SyncAction {
    /// Relative path this action applies to
    pub fn path(&self) -> &PathBuf {
        match self {
            SyncAction::DeleteFile { path }
            | SyncAction::DeleteDir { path }
            | SyncAction::CreateDir { path }
            | SyncAction::CopyFile { path, .. } => path,
        }
    }

    /// Kind of this action
    pub fn kind(&self) -> ActionKind {
        match self {
            SyncAction::DeleteFile { .. } => ActionKind::DeleteFile,
            SyncAction::DeleteDir { .. } => ActionKind::DeleteDir,
            SyncAction::CreateDir { .. } => ActionKind::CreateDir,
            SyncAction::CopyFile { .. } => ActionKind::CopyFile,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path().display())
    }
}

/// A change that could not be applied during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// What was being attempted
    pub action: ActionKind,
    /// Relative path of the item
    pub path: PathBuf,
    /// Rendered error
    pub message: String,
}

impl ItemFailure {
    /// Build a failure record from the error that caused it
    pub fn new(action: ActionKind, path: PathBuf, error: &MirrorError) -> Self {
        Self {
            action,
            path,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.action, self.path.display(), self.message)
    }
}

/// Counters and failures collected over one cycle
///
/// In dry-run mode the counters describe what *would* have changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Sequence number of the cycle, starting at 1
    pub sequence: u64,
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// When the cycle finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall time of the cycle in milliseconds
    pub duration_ms: u64,
    /// Whether the cycle only planned changes
    pub dry_run: bool,
    /// Files removed from the replica
    pub files_deleted: usize,
    /// Directories removed from the replica (top-most only)
    pub dirs_deleted: usize,
    /// Directories created in the replica
    pub dirs_created: usize,
    /// Files copied into the replica
    pub files_copied: usize,
    /// Bytes copied into the replica
    pub bytes_copied: u64,
    /// Files present on both sides with identical content
    pub files_unchanged: usize,
    /// Comparisons that failed and were treated as changed
    pub comparison_failures: usize,
    /// Items that could not be applied
    pub failures: Vec<ItemFailure>,
}

impl CycleReport {
    /// Start a report for cycle `sequence`
    pub fn new(sequence: u64, dry_run: bool) -> Self {
        Self {
            sequence,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            dry_run,
            files_deleted: 0,
            dirs_deleted: 0,
            dirs_created: 0,
            files_copied: 0,
            bytes_copied: 0,
            files_unchanged: 0,
            comparison_failures: 0,
            failures: Vec::new(),
        }
    }

    /// Stamp the finish time
    pub fn finish(&mut self, started: Instant) {
        self.finished_at = Some(Utc::now());
        self.duration_ms = started.elapsed().as_millis() as u64;
    }

    /// Total number of changes applied (or planned)
    pub fn total_actions(&self) -> usize {
        self.files_deleted + self.dirs_deleted + self.dirs_created + self.files_copied
    }

    /// Record an applied action in the counters
    pub fn record(&mut self, action: &SyncAction) {
        match action {
            SyncAction::DeleteFile { .. } => self.files_deleted += 1,
            SyncAction::DeleteDir { .. } => self.dirs_deleted += 1,
            SyncAction::CreateDir { .. } => self.dirs_created += 1,
            SyncAction::CopyFile { bytes, .. } => {
                self.files_copied += 1;
                self.bytes_copied += bytes;
            }
        }
    }
}

/// Result of one cycle
///
/// A failed cycle still carries the report of whatever it managed to do.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Every planned change was applied
    Success(CycleReport),
    /// The cycle ended early or some items failed
    Failed {
        /// Why the cycle failed
        error: MirrorError,
        /// Work done before and around the failure
        report: CycleReport,
    },
}

impl CycleOutcome {
    /// Build the outcome for a finished report
    ///
    /// Item failures turn the outcome into [`MirrorError::PartialFailure`].
    pub fn from_report(report: CycleReport) -> Self {
        if report.failures.is_empty() {
            CycleOutcome::Success(report)
        } else {
            let failed = report.failures.len();
            CycleOutcome::Failed {
                error: MirrorError::PartialFailure { failed },
                report,
            }
        }
    }

    /// Whether the cycle succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success(_))
    }

    /// Report of the cycle
    pub fn report(&self) -> &CycleReport {
        match self {
            CycleOutcome::Success(report) | CycleOutcome::Failed { report, .. } => report,
        }
    }

    /// Error of a failed cycle
    pub fn error(&self) -> Option<&MirrorError> {
        match self {
            CycleOutcome::Success(_) => None,
            CycleOutcome::Failed { error, .. } => Some(error),
        }
    }

    /// Convert into a `Result`, dropping the partial report on failure
    pub fn into_result(self) -> Result<CycleReport> {
        match self {
            CycleOutcome::Success(report) => Ok(report),
            CycleOutcome::Failed { error, .. } => Err(error),
        }
    }
}

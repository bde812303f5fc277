//! Event sink for mirror cycles
//!
//! Components never log cycle events through process-wide state of their
//! own; they are handed an `Arc<dyn SyncObserver>` at construction and
//! report through it. [`TracingObserver`] forwards to `tracing`, which is
//! what the binary installs. [`RecordingObserver`] keeps events in memory.

use crate::types::{CycleOutcome, CyclePhase, ItemFailure, SyncAction};
use crate::utils::format_bytes;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Receives cycle events
///
/// Every method has an empty default so implementors override only what
/// they care about.
pub trait SyncObserver: Send + Sync {
    /// A cycle is starting
    fn cycle_started(&self, _sequence: u64) {}

    /// The cycle entered a new phase
    fn phase_changed(&self, _phase: CyclePhase) {}

    /// A change was applied to the replica
    fn action(&self, _action: &SyncAction) {}

    /// A change would be applied (dry run)
    fn planned(&self, _action: &SyncAction) {}

    /// A content comparison failed and the file was scheduled for copy
    fn comparison_failed(&self, _path: &Path, _message: &str) {}

    /// A change could not be applied
    fn item_failed(&self, _failure: &ItemFailure) {}

    /// The cycle is over
    fn cycle_finished(&self, _outcome: &CycleOutcome) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl SyncObserver for NoOpObserver {}

/// Observer that emits structured `tracing` events
///
/// Actions and cycle results go out at info, phases at debug, per-item
/// failures and failed cycles at error.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn cycle_started(&self, sequence: u64) {
        info!(cycle = sequence, "Synchronization started");
    }

    fn phase_changed(&self, phase: CyclePhase) {
        debug!(%phase, "Entering phase");
    }

    fn action(&self, action: &SyncAction) {
        match action {
            SyncAction::DeleteFile { path } => info!(path = %path.display(), "Deleted file"),
            SyncAction::DeleteDir { path } => info!(path = %path.display(), "Deleted directory"),
            SyncAction::CreateDir { path } => info!(path = %path.display(), "Created directory"),
            SyncAction::CopyFile { path, bytes, replaced } => info!(
                path = %path.display(),
                size = %format_bytes(*bytes),
                replaced = *replaced,
                "Copied file"
            ),
        }
    }

    fn planned(&self, action: &SyncAction) {
        info!(path = %action.path().display(), "Would {}", action.kind());
    }

    fn comparison_failed(&self, path: &Path, message: &str) {
        warn!(path = %path.display(), error = message, "Comparison failed, copying anyway");
    }

    fn item_failed(&self, failure: &ItemFailure) {
        error!(
            path = %failure.path.display(),
            action = %failure.action,
            error = %failure.message,
            "Item failed"
        );
    }

    fn cycle_finished(&self, outcome: &CycleOutcome) {
        let report = outcome.report();
        match outcome {
            CycleOutcome::Success(_) => info!(
                cycle = report.sequence,
                at = %report.finished_at.unwrap_or(report.started_at).to_rfc3339(),
                actions = report.total_actions(),
                unchanged = report.files_unchanged,
                duration_ms = report.duration_ms,
                "Synchronization completed"
            ),
            CycleOutcome::Failed { error, .. } => error!(
                cycle = report.sequence,
                at = %report.finished_at.unwrap_or(report.started_at).to_rfc3339(),
                actions = report.total_actions(),
                error = %error,
                "Synchronization failed"
            ),
        }
    }
}

/// An event captured by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    /// Cycle start with its sequence number
    CycleStarted(u64),
    /// Phase transition
    Phase(CyclePhase),
    /// Applied action
    Action(SyncAction),
    /// Planned action
    Planned(SyncAction),
    /// Comparison failure for a path
    ComparisonFailed(std::path::PathBuf),
    /// Item failure
    ItemFailed(ItemFailure),
    /// Cycle end with its sequence number and success flag
    CycleFinished {
        /// Sequence number
        sequence: u64,
        /// Whether the cycle succeeded
        success: bool,
    },
}

/// Observer that records events in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    /// Applied actions recorded so far
    pub fn actions(&self) -> Vec<SyncAction> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Action(action) => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of finished cycles
    pub fn cycles_finished(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, ObservedEvent::CycleFinished { .. }))
            .count()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: ObservedEvent) {
        self.events.lock().push(event);
    }
}

impl SyncObserver for RecordingObserver {
    fn cycle_started(&self, sequence: u64) {
        self.push(ObservedEvent::CycleStarted(sequence));
    }

    fn phase_changed(&self, phase: CyclePhase) {
        self.push(ObservedEvent::Phase(phase));
    }

    fn action(&self, action: &SyncAction) {
        self.push(ObservedEvent::Action(action.clone()));
    }

    fn planned(&self, action: &SyncAction) {
        self.push(ObservedEvent::Planned(action.clone()));
    }

    fn comparison_failed(&self, path: &Path, _message: &str) {
        self.push(ObservedEvent::ComparisonFailed(path.to_path_buf()));
    }

    fn item_failed(&self, failure: &ItemFailure) {
        self.push(ObservedEvent::ItemFailed(failure.clone()));
    }

    fn cycle_finished(&self, outcome: &CycleOutcome) {
        self.push(ObservedEvent::CycleFinished {
            sequence: outcome.report().sequence,
            success: outcome.is_success(),
        });
    }
}

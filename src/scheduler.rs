//! Periodic driver for the mirror engine
//!
//! [`SyncScheduler`] runs one cycle, waits the interval, and repeats until
//! its [`CancellationToken`] is cancelled. Cycles execute on tokio's blocking
//! pool. Cancellation is honoured before a cycle starts and while waiting;
//! a cycle already in flight always runs to completion.
//!
//! A failed cycle is reported to the engine's observer and the loop carries
//! on. Nothing short of cancellation stops it.

use crate::error::{MirrorError, Result};
use crate::mirror::MirrorEngine;
use crate::types::{CycleOutcome, CycleReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs mirror cycles at a fixed interval
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    engine: Arc<MirrorEngine>,
    interval: Duration,
}

impl SyncScheduler {
    /// Create a scheduler for `engine`
    ///
    /// # Errors
    ///
    /// [`MirrorError::InvalidConfiguration`] if `interval` is zero.
    pub fn new(engine: Arc<MirrorEngine>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(MirrorError::invalid_config("sync interval must be positive"));
        }
        Ok(Self { engine, interval })
    }

    /// Engine driven by this scheduler
    pub fn engine(&self) -> &Arc<MirrorEngine> {
        &self.engine
    }

    /// Interval between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the loop on the current runtime
    pub fn start(self) -> SchedulerHandle {
        self.start_with_token(CancellationToken::new())
    }

    /// Spawn the loop, stopping when `token` is cancelled
    pub fn start_with_token(self, token: CancellationToken) -> SchedulerHandle {
        let task = tokio::spawn(self.run_loop(token.clone()));
        SchedulerHandle { token, task }
    }

    /// Run exactly one cycle
    pub async fn run_once(&self) -> CycleOutcome {
        execute(self.engine.clone(), 1).await
    }

    async fn run_loop(self, token: CancellationToken) -> u64 {
        info!(
            source = %self.engine.source_root().display(),
            replica = %self.engine.replica_root().display(),
            interval = %humantime::format_duration(self.interval),
            "Scheduler started"
        );

        let mut completed = 0u64;
        loop {
            if token.is_cancelled() {
                break;
            }

            let sequence = completed + 1;
            let outcome = execute(self.engine.clone(), sequence).await;
            completed = sequence;
            debug!(cycle = sequence, success = outcome.is_success(), "Cycle done");

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(cycles = completed, "Scheduler stopped");
        completed
    }
}

async fn execute(engine: Arc<MirrorEngine>, sequence: u64) -> CycleOutcome {
    let worker = engine.clone();
    match tokio::task::spawn_blocking(move || worker.run_cycle(sequence)).await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            let mut report = CycleReport::new(sequence, engine.is_dry_run());
            report.finished_at = Some(chrono::Utc::now());
            let outcome = CycleOutcome::Failed {
                error: MirrorError::from(join_error),
                report,
            };
            engine.observer().cycle_finished(&outcome);
            outcome
        }
    }
}

/// Handle to a running scheduler
#[derive(Debug)]
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<u64>,
}

impl SchedulerHandle {
    /// Request a stop at the next safe point
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Token controlling the loop
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit and return the number of completed cycles
    ///
    /// # Errors
    ///
    /// [`MirrorError::TaskJoin`] if the loop task panicked.
    pub async fn join(self) -> Result<u64> {
        Ok(self.task.await?)
    }

    /// Stop the loop and wait for it
    pub async fn shutdown(self) -> Result<u64> {
        self.stop();
        self.join().await
    }
}

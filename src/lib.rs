//! # Treemirror - Periodic one-way directory mirroring
//!
//! Keeps a *replica* directory identical to a *source* directory by running
//! the same scan-diff-apply cycle at a fixed interval.
//!
//! ## Overview
//!
//! Each cycle:
//! - Snapshots the relative file and directory paths under both roots
//! - Compares files present on both sides by content (SHA-256), never by
//!   timestamps
//! - Deletes replica entries the source no longer has
//! - Creates missing directories and copies new or changed files
//!
//! After a successful cycle the replica contains exactly the source's paths
//! with identical file content. A second cycle with no source change does
//! nothing. The source is never written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treemirror::{MirrorBuilder, SyncScheduler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = MirrorBuilder::new()
//!     .exclude_patterns(vec!["*.swp".to_string()])
//!     .build("./source", "./replica")?;
//!
//! let handle = SyncScheduler::new(Arc::new(engine), Duration::from_secs(30))?.start();
//!
//! // ... later
//! let cycles = handle.shutdown().await?;
//! println!("Ran {} cycles", cycles);
//! # Ok(())
//! # }
//! ```
//!
//! ### Single cycle
//!
//! ```rust,no_run
//! use treemirror::MirrorBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = MirrorBuilder::new().build("./source", "./replica")?;
//! let report = engine.run_cycle(1).into_result()?;
//! println!("{} copied, {} deleted", report.files_copied, report.files_deleted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! A root that cannot be scanned ends the cycle. Anything else (a file that
//! cannot be hashed, deleted, created or copied) is recorded against that
//! item and the cycle moves on. Neither kind stops the scheduler; the next
//! interval is a fresh attempt. Files that cannot be compared are copied.
//!
//! ## Module Organization
//!
//! - [`catalog`]: Directory snapshots
//! - [`compare`]: Content comparison
//! - [`diff`]: Snapshot differencing
//! - [`mirror`]: The cycle engine and its builder
//! - [`scheduler`]: Periodic driver with cooperative cancellation
//! - [`observer`]: Event sink for cycle progress
//! - [`config`]: Startup configuration
//! - [`logging`]: Subscriber setup for the binary
//! - [`types`]: Reports, actions and phases
//! - [`error`]: Error types

pub mod catalog;
pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod observer;
pub mod scheduler;
pub mod types;

mod collections;
mod utils;

pub use catalog::{DirectorySnapshot, PathCatalog};
pub use compare::{ContentComparator, DigestComparator};
pub use config::SyncConfig;
pub use diff::{SyncDiff, TreeDiffer};
pub use error::{MirrorError, Result};
pub use mirror::{MirrorBuilder, MirrorEngine};
pub use observer::{NoOpObserver, ObservedEvent, RecordingObserver, SyncObserver, TracingObserver};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use types::*;

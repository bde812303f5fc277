//! Process-wide log setup for the binary
//!
//! Installs a `tracing` registry with two formatted layers: one on stderr
//! and one writing to a daily rolling file in the log directory. The file
//! writer is non-blocking; keep the returned [`LogGuard`] alive for the life
//! of the process so buffered lines are flushed on exit.
//!
//! Library code never calls [`init`]. It reports through a
//! [`SyncObserver`](crate::observer::SyncObserver) and lets the embedding
//! application decide where events go.

use crate::error::{MirrorError, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default file name prefix; files are named `<prefix>.YYYY-MM-DD`
pub const DEFAULT_FILE_PREFIX: &str = "treemirror.log";

/// Where and how verbosely to log
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory receiving the rolling log files
    pub log_dir: PathBuf,
    /// Debug level instead of info when `RUST_LOG` is unset
    pub verbose: bool,
    /// File name prefix
    pub file_prefix: String,
}

impl LogSettings {
    /// Settings for `log_dir` with the default prefix
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            verbose: false,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }

    /// Toggle debug level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Keeps the background log writer alive
#[must_use = "dropping the guard stops the file writer"]
#[derive(Debug)]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Install the global subscriber
///
/// # Errors
///
/// - [`MirrorError::Io`] if the log directory cannot be created
/// - [`MirrorError::InvalidConfiguration`] if the appender cannot be built
/// - [`MirrorError::Internal`] if a global subscriber is already set
pub fn init(settings: &LogSettings) -> Result<LogGuard> {
    let appender = file_appender(settings)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter(settings.verbose))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| MirrorError::internal(format!("logging already initialized: {}", e)))?;

    Ok(LogGuard { _file: guard })
}

/// Level filter: `RUST_LOG` if set, else `info` (or `debug` when verbose)
pub fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Daily rolling appender in the configured directory
pub fn file_appender(settings: &LogSettings) -> Result<RollingFileAppender> {
    fs::create_dir_all(&settings.log_dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&settings.file_prefix)
        .build(&settings.log_dir)
        .map_err(|e| {
            MirrorError::invalid_config(format!(
                "cannot open log directory {:?}: {}",
                settings.log_dir, e
            ))
        })
}

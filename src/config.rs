//! Startup configuration
//!
//! [`SyncConfig`] carries what the entry point collects from the user: the
//! two roots, the sync interval and the log directory. [`SyncConfig::validate`]
//! turns raw input into a config the engine can trust:
//!
//! - the source exists and is a directory;
//! - the replica is neither the source nor nested with it in either
//!   direction (mirroring a tree into itself would chase its own copies);
//! - the interval is strictly positive;
//! - roots are absolute.
//!
//! Intervals are parsed by [`parse_interval`], which accepts whole seconds
//! (`"10"`) or `humantime` durations (`"90s"`, `"5m"`, `"1h 30m"`).

use crate::error::{MirrorError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Validated startup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Directory to mirror
    pub source: PathBuf,
    /// Directory kept identical to the source
    pub replica: PathBuf,
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Directory receiving the log files
    pub log_dir: PathBuf,
}

impl SyncConfig {
    /// Create an unvalidated configuration
    pub fn new(
        source: impl Into<PathBuf>,
        replica: impl Into<PathBuf>,
        interval: Duration,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            interval,
            log_dir: log_dir.into(),
        }
    }

    /// Validate the configuration and make its paths absolute
    ///
    /// # Errors
    ///
    /// - [`MirrorError::SourceMissing`] if the source is not an existing directory
    /// - [`MirrorError::InvalidConfiguration`] for empty paths, a zero
    ///   interval, or overlapping roots
    pub fn validate(self) -> Result<Self> {
        require_non_empty(&self.source, "source directory")?;
        require_non_empty(&self.replica, "replica directory")?;
        require_non_empty(&self.log_dir, "log directory")?;

        if self.interval.is_zero() {
            return Err(MirrorError::invalid_config("sync interval must be positive"));
        }

        let (source, replica) = check_roots(&self.source, &self.replica)?;
        let log_dir = std::path::absolute(&self.log_dir)?;

        Ok(Self {
            source,
            replica,
            interval: self.interval,
            log_dir,
        })
    }
}

/// Check that `source` exists and does not overlap with `replica`
///
/// Returns both roots in canonical form. A replica that does not exist yet
/// is resolved through its closest existing ancestor.
pub fn check_roots(source: &Path, replica: &Path) -> Result<(PathBuf, PathBuf)> {
    if !source.is_dir() {
        return Err(MirrorError::SourceMissing(source.to_path_buf()));
    }
    let source = source.canonicalize()?;
    let replica = resolve(replica)?;

    if replica == source {
        return Err(MirrorError::invalid_config(
            "source and replica must be different directories",
        ));
    }
    if replica.starts_with(&source) {
        return Err(MirrorError::invalid_config(format!(
            "replica {:?} must not be inside source {:?}",
            replica, source
        )));
    }
    if source.starts_with(&replica) {
        return Err(MirrorError::invalid_config(format!(
            "source {:?} must not be inside replica {:?}",
            source, replica
        )));
    }

    Ok((source, replica))
}

/// Parse a sync interval
///
/// A bare integer is a number of seconds; anything else goes through
/// `humantime`. Zero is rejected.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let interval = match trimmed.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => humantime::parse_duration(trimmed).map_err(|e| {
            MirrorError::invalid_config(format!("invalid sync interval {:?}: {}", input, e))
        })?,
    };

    if interval.is_zero() {
        return Err(MirrorError::invalid_config("sync interval must be positive"));
    }
    Ok(interval)
}

fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    for existing in absolute.ancestors() {
        if existing.exists() {
            let rest = absolute.strip_prefix(existing).unwrap_or(Path::new(""));
            return Ok(existing.canonicalize()?.join(rest));
        }
    }
    Ok(absolute)
}

fn require_non_empty(path: &Path, what: &str) -> Result<()> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(MirrorError::invalid_config(format!("{} cannot be empty", what)));
    }
    Ok(())
}

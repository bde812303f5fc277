//! Error types for treemirror
//!
//! Every fallible operation in the crate returns [`Result<T>`] with a
//! [`MirrorError`]. Errors fall into two groups:
//!
//! - **Cycle-fatal**: the scan of a root failed, so no diff can be computed
//!   and the cycle ends early ([`MirrorError::Scan`]).
//! - **Per-item**: one file or directory could not be compared, deleted,
//!   created or copied. These are recorded in the cycle report and never stop
//!   the remaining items of the phase ([`MirrorError::is_per_item`]).
//!
//! Neither group ever terminates the scheduler; the next interval starts a
//! fresh attempt.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the treemirror library
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Main error type for all treemirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    /// I/O errors not tied to a specific mirrored item
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A root could not be enumerated
    #[error("Failed to scan {root:?}: {source}")]
    Scan {
        /// Root being scanned
        root: PathBuf,
        /// Underlying traversal error
        #[source]
        source: std::io::Error,
    },

    /// A file pair could not be hashed
    #[error("Failed to compare {path:?}: {source}")]
    Comparison {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A replica entry could not be removed
    #[error("Failed to delete {path:?}: {source}")]
    Delete {
        /// Path in the replica
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A replica directory could not be created
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        /// Path in the replica
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be copied into the replica
    #[error("Failed to copy {path:?}: {source}")]
    Copy {
        /// Destination path in the replica
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The cycle ran to completion but some items failed
    #[error("Cycle completed with {failed} failed item(s)")]
    PartialFailure {
        /// Number of failed items
        failed: usize,
    },

    /// Source root does not exist or is not a directory
    #[error("Source directory not found: {0:?}")]
    SourceMissing(PathBuf),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Exclude pattern could not be parsed
    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),

    /// Background task panicked or was aborted
    #[error("Sync task failed: {0}")]
    TaskJoin(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<globset::Error> for MirrorError {
    fn from(err: globset::Error) -> Self {
        MirrorError::InvalidPattern(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MirrorError {
    fn from(err: tokio::task::JoinError) -> Self {
        MirrorError::TaskJoin(err.to_string())
    }
}

impl MirrorError {
    /// Create an invalid configuration error with a custom message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        MirrorError::InvalidConfiguration(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        MirrorError::Internal(msg.into())
    }

    /// Check if this error belongs to a single mirrored item
    ///
    /// Per-item errors are isolated: the phase that raised them keeps going.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            MirrorError::Comparison { .. }
                | MirrorError::Delete { .. }
                | MirrorError::CreateDir { .. }
                | MirrorError::Copy { .. }
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            MirrorError::SourceMissing(path) => {
                format!("Source directory {:?} does not exist. Check the path and try again.", path)
            }
            MirrorError::Scan { root, .. } => {
                format!("Could not read {:?}. Check that it exists and is readable.", root)
            }
            MirrorError::PartialFailure { failed } => {
                format!(
                    "{} item(s) could not be mirrored. They will be retried on the next cycle.",
                    failed
                )
            }
            _ => self.to_string(),
        }
    }
}

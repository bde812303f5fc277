//! Content equality of a source/replica file pair
//!
//! Content is authoritative: modification times and sizes never make two
//! files *equal*. [`DigestComparator`] hashes both files with SHA-256 and
//! compares the digests. A length mismatch may short-circuit to "different",
//! since files of different length cannot hold the same bytes.

use crate::error::{MirrorError, Result};
use crate::utils;
use std::fs;
use std::path::Path;
use tracing::trace;

/// Decides whether two files hold identical content
///
/// Implementations must be usable from the blocking pool the scheduler runs
/// cycles on, hence `Send + Sync`.
pub trait ContentComparator: Send + Sync {
    /// Whether `source` and `replica` have byte-identical content
    ///
    /// # Errors
    ///
    /// [`MirrorError::Comparison`] naming the file that could not be read.
    fn same_content(&self, source: &Path, replica: &Path) -> Result<bool>;
}

/// SHA-256 digest comparison
#[derive(Debug, Clone)]
pub struct DigestComparator {
    size_shortcut: bool,
}

impl DigestComparator {
    /// Create a comparator with the size shortcut enabled
    pub fn new() -> Self {
        Self { size_shortcut: true }
    }

    /// Toggle the length pre-check
    ///
    /// When enabled, files of different length are reported different
    /// without hashing. Equal lengths always fall through to the digests.
    pub fn with_size_shortcut(mut self, enabled: bool) -> Self {
        self.size_shortcut = enabled;
        self
    }

    /// SHA-256 hex digest of a file
    pub fn digest(&self, path: &Path) -> Result<String> {
        utils::hash_file_content(path).map_err(|source| MirrorError::Comparison {
            path: path.to_path_buf(),
            source,
        })
    }

    fn file_len(path: &Path) -> Result<u64> {
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|source| MirrorError::Comparison {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl Default for DigestComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentComparator for DigestComparator {
    fn same_content(&self, source: &Path, replica: &Path) -> Result<bool> {
        if self.size_shortcut && Self::file_len(source)? != Self::file_len(replica)? {
            trace!("Size differs: {:?} vs {:?}", source, replica);
            return Ok(false);
        }

        let source_hash = self.digest(source)?;
        let replica_hash = self.digest(replica)?;
        trace!("Hash of {:?}: {}", source, source_hash);
        trace!("Hash of {:?}: {}", replica, replica_hash);

        Ok(source_hash == replica_hash)
    }
}

//! Filesystem helpers used by the mirror components
//!
//! ## Categories of Utilities
//!
//! ### Content
//! - Streaming SHA-256 of a file's content
//!
//! ### Paths
//! - Converting absolute paths under a root into relative paths
//!
//! ### Replica mutation
//! - Idempotent file and directory removal (a missing target is not an error)
//! - Atomic file copy (temp file in the destination directory, then rename)
//!
//! ### Display
//! - Human-readable byte counts
//!
//! The mutation helpers return plain `std::io::Result` so callers can wrap
//! the error in the variant matching the phase that failed.

use crate::error::{MirrorError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Prefix of in-flight copy files inside the replica
pub const PARTIAL_PREFIX: &str = ".treemirror-";

/// Suffix of in-flight copy files inside the replica
pub const PARTIAL_SUFFIX: &str = ".part";

/// Hash a file's content using SHA-256
///
/// Reads the file in 8KB chunks so large files never have to fit in memory.
/// An empty file hashes to the digest of empty input.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened or read.
///
/// # Example
///
/// ```rust,ignore
/// let hash = hash_file_content(Path::new("example.txt"))?;
/// assert_eq!(hash.len(), 64);
/// ```
pub fn hash_file_content(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Make a path relative to a base path
///
/// Tries a lexical strip first, which keeps symlinked paths as they were
/// walked. Falls back to canonicalizing both sides when the lexical strip
/// fails (for example when `base` contains `..`).
///
/// # Errors
///
/// - [`MirrorError::Internal`] if the path is not under the base path
/// - [`MirrorError::Io`] if canonicalization fails (fallback case only)
///
/// # Example
///
/// ```rust,ignore
/// let relative = make_relative(Path::new("/data/src/a/b.txt"), Path::new("/data/src"))?;
/// assert_eq!(relative, PathBuf::from("a/b.txt"));
/// ```
pub fn make_relative(path: &Path, base: &Path) -> Result<PathBuf> {
    if let Ok(relative) = path.strip_prefix(base) {
        return Ok(relative.to_path_buf());
    }

    let path_canon = path.canonicalize()?;
    let base_canon = base.canonicalize()?;

    path_canon
        .strip_prefix(&base_canon)
        .map(|p| p.to_path_buf())
        .map_err(|_| {
            MirrorError::internal(format!(
                "Path {:?} is not relative to {:?}",
                path_canon, base_canon
            ))
        })
}

/// Remove a file if it exists
///
/// Returns `Ok(true)` if the file was removed and `Ok(false)` if it was
/// already gone. Symlinks are removed as links, never followed.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            trace!("Removed file: {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a directory and everything below it if it exists
///
/// Returns `Ok(true)` if the directory was removed and `Ok(false)` if it was
/// already gone.
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            trace!("Removed directory tree: {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Copy a file atomically, overwriting the destination
///
/// The content is streamed into a temporary file created next to `dest`
/// and then renamed over it, so `dest` is either the old content or the
/// complete new content, never a partial write. The source permissions are
/// applied to the copy before the rename. Missing parent directories of
/// `dest` are created.
///
/// # Returns
///
/// Number of bytes copied.
///
/// # Errors
///
/// Returns the underlying I/O error of whichever step failed. The
/// temporary file is removed on failure.
pub fn copy_atomic(source: &Path, dest: &Path) -> io::Result<u64> {
    let parent = dest.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination {:?} has no parent directory", dest),
        )
    })?;
    fs::create_dir_all(parent)?;

    let mut reader = File::open(source)?;
    let permissions = reader.metadata()?.permissions();

    let mut temp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent)?;
    let bytes = io::copy(&mut reader, temp.as_file_mut())?;
    fs::set_permissions(temp.path(), permissions)?;

    temp.persist(dest).map_err(|e| e.error)?;
    trace!("Copied {} bytes from {:?} to {:?}", bytes, source, dest);

    Ok(bytes)
}

/// Format bytes in human-readable form
///
/// Uses binary units (1024-based). Values below 1 KB print as whole bytes,
/// larger values with two decimals.
///
/// ```rust,ignore
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

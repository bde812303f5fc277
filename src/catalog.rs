//! Directory enumeration for mirror cycles
//!
//! [`PathCatalog`] walks a root recursively and produces a
//! [`DirectorySnapshot`]: the set of directories strictly below the root and
//! the set of files below the root, both as paths relative to the root.
//! Relative paths are the identity used to match entries between the source
//! and the replica.
//!
//! ## Exclusions
//!
//! Glob patterns (see [`globset`]) are matched against both the relative path
//! and the entry's file name, so `*.tmp` hides temp files at any depth and
//! `node_modules` hides every directory of that name together with its
//! contents. Excluded entries are invisible to the diff, which means they are
//! never copied and never deleted on their own. The one exception is an
//! excluded entry inside a replica directory that is itself stale: removing
//! that directory removes everything beneath it, excluded or not.
//!
//! ## Symbolic links
//!
//! Without link following, a link to a file is listed as a file and mirrored
//! by copying its target's content. A link to a directory is skipped with a
//! warning unless [`PathCatalog::with_dir_links_as_files`] is set, in which
//! case it is listed as a file. The replica side uses the latter so that a
//! link found in the replica is removed as a link and never entered.
//!
//! ## Example
//!
//! ```rust,no_run
//! use treemirror::catalog::PathCatalog;
//!
//! # fn main() -> treemirror::Result<()> {
//! let catalog = PathCatalog::new("./data").with_exclude_patterns(&["*.tmp".to_string()])?;
//! let snapshot = catalog.snapshot()?;
//! println!("{} dirs, {} files", snapshot.dirs.len(), snapshot.files.len());
//! # Ok(())
//! # }
//! ```

use crate::collections::HashSet;
use crate::error::{MirrorError, Result};
use crate::utils::{self, PARTIAL_PREFIX, PARTIAL_SUFFIX};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// All relative directory and file paths under a root at one instant
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    /// Root the paths are relative to
    pub root: PathBuf,
    /// Directories strictly inside the root
    pub dirs: HashSet<PathBuf>,
    /// Files (and other non-directory entries) inside the root
    pub files: HashSet<PathBuf>,
    /// When the walk started
    pub taken_at: DateTime<Utc>,
}

impl DirectorySnapshot {
    /// Empty snapshot for `root`
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs: HashSet::default(),
            files: HashSet::default(),
            taken_at: Utc::now(),
        }
    }

    /// Whether the tree holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    /// Absolute path of a relative entry
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Compile exclude patterns into a single matcher
///
/// Returns `None` for an empty pattern list.
///
/// # Errors
///
/// [`MirrorError::InvalidPattern`] if any pattern fails to parse.
pub fn build_exclude_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// Recursive enumerator for one root
///
/// ## Configuration Options
///
/// - `root`: directory to enumerate
/// - `excludes`: compiled exclude patterns (none by default)
/// - `follow_symlinks`: descend into symlinked directories (off by default;
///   a link to a file is then listed as a file and mirrored by plain copy)
/// - `dir_links_as_files`: when not following, list links to directories as
///   files instead of skipping them (off by default)
#[derive(Debug, Clone)]
pub struct PathCatalog {
    root: PathBuf,
    excludes: Option<GlobSet>,
    follow_symlinks: bool,
    dir_links_as_files: bool,
}

impl PathCatalog {
    /// Create a catalog for `root` with default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excludes: None,
            follow_symlinks: false,
            dir_links_as_files: false,
        }
    }

    /// Set exclude patterns from glob strings
    ///
    /// # Errors
    ///
    /// [`MirrorError::InvalidPattern`] if any pattern fails to parse.
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.excludes = build_exclude_set(patterns)?;
        Ok(self)
    }

    /// Set an already compiled exclude matcher
    pub fn with_excludes(mut self, excludes: Option<GlobSet>) -> Self {
        self.excludes = excludes;
        self
    }

    /// Set symbolic link following behavior
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// List symlinks to directories as plain entries instead of skipping them
    ///
    /// Only meaningful without link following. A replica catalog sets this so
    /// that every link in the replica shows up as a file to delete.
    pub fn with_dir_links_as_files(mut self, as_files: bool) -> Self {
        self.dir_links_as_files = as_files;
        self
    }

    /// Root this catalog enumerates
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the root and collect every directory and file below it
    ///
    /// Ordering of the collected entries is unspecified. An empty root yields
    /// an empty snapshot. Leftover in-flight copy files (from a copy that was
    /// interrupted in an earlier run) are listed like any other file, so a
    /// replica scan picks them up for deletion.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Scan`] if the root is missing, is not a directory, or
    /// any part of the tree cannot be read.
    pub fn snapshot(&self) -> Result<DirectorySnapshot> {
        let start = Instant::now();
        self.check_root()?;

        let mut snapshot = DirectorySnapshot::empty(self.root.clone());
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(self.follow_symlinks)
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry));

        for entry in walker {
            let entry = entry.map_err(|e| MirrorError::Scan {
                root: self.root.clone(),
                source: io::Error::from(e),
            })?;
            let relative = utils::make_relative(entry.path(), &self.root)?;

            if self.skips_dir_link(&entry) {
                warn!(path = %relative.display(), "Skipping symlink to directory");
                continue;
            }

            if entry.file_type().is_dir() {
                snapshot.dirs.insert(relative);
            } else {
                snapshot.files.insert(relative);
            }
        }

        debug!(
            "Catalogued {} directories and {} files under {:?} in {:?}",
            snapshot.dirs.len(),
            snapshot.files.len(),
            self.root,
            start.elapsed()
        );

        Ok(snapshot)
    }

    fn check_root(&self) -> Result<()> {
        let metadata = fs::metadata(&self.root).map_err(|source| MirrorError::Scan {
            root: self.root.clone(),
            source,
        })?;

        if !metadata.is_dir() {
            return Err(MirrorError::Scan {
                root: self.root.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }
        Ok(())
    }

    fn skips_dir_link(&self, entry: &DirEntry) -> bool {
        !self.follow_symlinks
            && !self.dir_links_as_files
            && entry.path_is_symlink()
            && entry.path().is_dir()
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let Some(excludes) = &self.excludes else {
            return false;
        };

        // In-flight copies are never excluded: they must stay visible so the
        // replica scan removes the ones left behind by a crash.
        let name = entry.file_name().to_string_lossy();
        if name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX) {
            return false;
        }

        let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
        excludes.is_match(relative) || excludes.is_match(entry.file_name())
    }
}

//! Path set type that switches between gxhash and std collections based on
//! the `gxhash` feature. Snapshots hold every path of a tree, so set lookups
//! dominate the diff; gxhash is faster where the CPU supports it.
//!
//! Build sets with `HashSet::default()` so call sites read the same with
//! either backend.

#[cfg(feature = "gxhash")]
pub use gxhash::HashSet as GxHashSet;

#[cfg(not(feature = "gxhash"))]
use std::collections::HashSet as StdHashSet;

/// Type alias for HashSet that uses gxhash when available, std otherwise
#[cfg(feature = "gxhash")]
pub type HashSet<T> = GxHashSet<T>;

/// Type alias for HashSet that uses gxhash when available, std otherwise
#[cfg(not(feature = "gxhash"))]
pub type HashSet<T> = StdHashSet<T>;

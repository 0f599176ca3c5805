//! # pathtree
//!
//! Resolve path expressions into depth-bounded, filterable trees of
//! filesystem entries.
//!
//! A raw path such as `~/music/*.mp3` or `./testdata/` is trimmed, has a
//! leading `~` expanded, is made absolute and cleaned, and is glob-expanded
//! when it contains wildcards. The result is an [`Entry`] carrying `lstat`
//! metadata and, down to a requested depth, its children. Trees can be
//! flattened back into a sequence, and [`Filter`]s decide which entries are kept.
//!
//! # Quick Start
//!
//! ```rust
//! use std::fs;
//! use pathtree::{FileFilter, RegexFilter};
//!
//! let dir = tempfile::tempdir().unwrap();
//! fs::create_dir(dir.path().join("one")).unwrap();
//! fs::write(dir.path().join("one/song.mp3"), "").unwrap();
//! fs::write(dir.path().join("one/notes.txt"), "").unwrap();
//!
//! let root = dir.path().display().to_string();
//!
//! // Everything two levels deep: one/, one/notes.txt, one/song.mp3
//! let all = pathtree::list(&root, 2, false, &[]).unwrap();
//! assert_eq!(all.len(), 3);
//!
//! // Files whose name ends in .mp3, via the builder
//! let mp3 = pathtree::tree(&root)
//!     .max_depth(2)
//!     .filter(FileFilter)
//!     .filter(RegexFilter::from_pattern(r"\.mp3$").unwrap())
//!     .list()
//!     .unwrap();
//! assert_eq!(pathtree::only_names(&mp3), [dir.path().join("one/song.mp3")]);
//! ```
//!
//! # Filtering and directories
//!
//! While a tree is built, filters only remove entries that are neither
//! directories nor symlinks. Directories are kept so the walk can reach
//! matching entries beneath a directory that would itself be rejected.
//! [`list`] then filters the flattened result once more, so what it returns
//! is exactly what passes every filter.

#![forbid(unsafe_code)]

mod builder;
mod engine;
mod entry;
mod error;
mod filter;
mod glob;
mod normalize;
#[cfg(feature = "watch")]
pub mod watch;

use std::path::{Path, PathBuf};

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::TreeBuilder;
pub use engine::build_tree;
pub use entry::{Entry, EntryKind};
pub use error::PathError;
pub use filter::{
    passes_all, path_passes_all, permission_bits, AlwaysFalse, AlwaysTrue, DateRangeFilter, DirFilter, FileFilter,
    Filter, PermissionRangeFilter, RegexFilter, SizeRangeFilter, SkipSetFilter,
};
pub use normalize::{home_dir, normalize, Normalized};

// ── Entry points ──────────────────────────────────────────────────────────────

/// Create a [`TreeBuilder`] for `path`.
pub fn tree(path: impl Into<String>) -> TreeBuilder {
    TreeBuilder::new(path)
}

/// Resolve `path` into a single entry without reading any directory.
///
/// A glob with several matches yields a glob root whose children are the
/// matches and whose metadata is that of the pattern's directory.
///
/// # Errors
///
/// [`PathError::Stat`] when the path does not exist, or any normalization error.
/// A glob with no matches is not an error.
pub fn resolve(path: &str) -> Result<Entry, PathError> {
    engine::resolve_one(path)
}

/// Every entry below `root`, depth first, with the root last if requested.
/// No filtering is applied.
pub fn flatten(root: &Entry, include_root: bool) -> Vec<&Entry> {
    root.flatten(include_root)
}

/// Build a tree and flatten it, keeping only entries that pass every filter.
///
/// Directories reached during the build are dropped here when they fail a
/// filter, but their contents were still visited.
pub fn list(
    path: &str,
    max_depth: usize,
    include_root: bool,
    filters: &[&dyn Filter],
) -> Result<Vec<Entry>, PathError> {
    let root = build_tree(path, max_depth, filters)?;
    filter_entries(root.into_flattened(include_root), filters)
}

/// Keep the entries that pass every filter, in order.
pub fn filter_entries(entries: Vec<Entry>, filters: &[&dyn Filter]) -> Result<Vec<Entry>, PathError> {
    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        if passes_all(filters, &entry)? {
            kept.push(entry);
        }
    }
    Ok(kept)
}

/// Whether any entry has exactly this absolute path.
pub fn contains(entries: &[Entry], path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    entries.iter().any(|e| e.path() == path)
}

/// The absolute paths of `entries`, in order.
pub fn only_names(entries: &[Entry]) -> Vec<PathBuf> {
    entries.iter().map(|e| e.path().to_path_buf()).collect()
}

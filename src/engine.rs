use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, trace};

use crate::entry::{Entry, EntryKind};
use crate::error::PathError;
use crate::filter::{passes_all, Filter};
use crate::normalize::normalize;

// ---------------------------------------------------------------------------
// resolve_one()
// ---------------------------------------------------------------------------

/// Resolve a raw path expression into a single entry, without descending.
///
/// A literal path (or a glob with exactly one match) is `lstat`ed directly.
/// A glob with several matches becomes a glob root: one child per match, and
/// its own metadata is the `lstat` of the directory containing the pattern,
/// and its kind is always [`EntryKind::Dir`], even when that directory is
/// reached through a symlink. A glob with no matches is a glob root with no
/// children.
pub fn resolve_one(raw: &str) -> Result<Entry, PathError> {
    let normalized = normalize(raw)?;

    if normalized.candidates.len() == 1 {
        return stat_entry(&normalized.candidates[0]);
    }

    let children = normalized
        .candidates
        .iter()
        .map(|candidate| stat_entry(candidate))
        .collect::<Result<Vec<_>, _>>()?;

    let base = normalized
        .glob_base
        .as_deref()
        .unwrap_or(normalized.pattern.as_path());
    let mut root = stat_entry(base)?;
    if fs::metadata(base).map(|m| m.is_dir()).unwrap_or(false) {
        root.kind = EntryKind::Dir;
    }
    root.path = normalized.pattern;
    root.children = children;
    root.glob = true;
    Ok(root)
}

/// `lstat` one concrete path. No tilde or glob handling: the path is taken as is.
pub(crate) fn stat_entry(path: &Path) -> Result<Entry, PathError> {
    let metadata = fs::symlink_metadata(path).map_err(|source| PathError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Entry::new(path.to_path_buf(), metadata))
}

// ---------------------------------------------------------------------------
// build_tree()
// ---------------------------------------------------------------------------

/// Resolve `raw` and materialize up to `max_depth` levels of children below it.
///
/// Filters only remove plain files and other non-directory, non-symlink
/// entries. Directories and symlinks are always kept so that their
/// descendants are still visited. Any stat or directory read failure aborts
/// the whole build.
pub fn build_tree(raw: &str, max_depth: usize, filters: &[&dyn Filter]) -> Result<Entry, PathError> {
    let mut root = resolve_one(raw)?;
    debug!(root = %root.path.display(), max_depth, glob = root.glob, "building tree");

    if max_depth == 0 {
        root.children.clear();
        return Ok(root);
    }

    if root.glob {
        // The matches are the first level below a glob root.
        let matches = std::mem::take(&mut root.children);
        root.children = admit(matches, filters)?;
        descend(&mut root.children, max_depth - 1, filters)?;
    } else if descends_into(&root) {
        populate_children(&mut root, max_depth, filters)?;
    }

    Ok(root)
}

/// List `node`'s directory, keep the children the filters admit, and recurse
/// into directories and symlinks while levels remain.
pub(crate) fn populate_children(
    node: &mut Entry,
    levels_remaining: usize,
    filters: &[&dyn Filter],
) -> Result<(), PathError> {
    trace!(dir = %node.path.display(), levels_remaining, "listing directory");

    let listed = list_dir(&node.path)?
        .iter()
        .map(|path| stat_entry(path))
        .collect::<Result<Vec<_>, _>>()?;

    node.children = admit(listed, filters)?;
    descend(&mut node.children, levels_remaining - 1, filters)
}

fn descend(
    children: &mut [Entry],
    levels_remaining: usize,
    filters: &[&dyn Filter],
) -> Result<(), PathError> {
    if levels_remaining == 0 {
        return Ok(());
    }
    for child in children.iter_mut() {
        if descends_into(child) {
            populate_children(child, levels_remaining, filters)?;
        }
    }
    Ok(())
}

/// Apply filters with the directory/symlink exemption.
fn admit(entries: Vec<Entry>, filters: &[&dyn Filter]) -> Result<Vec<Entry>, PathError> {
    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.is_dir() || entry.is_symlink() || passes_all(filters, &entry)? {
            kept.push(entry);
        } else {
            trace!(path = %entry.path.display(), "filtered out");
        }
    }
    Ok(kept)
}

/// Directories are descended. Symlinks are descended only when they point at
/// a directory, so a link to a file or a dangling link stays a leaf.
fn descends_into(entry: &Entry) -> bool {
    match entry.kind {
        EntryKind::Dir => true,
        EntryKind::Symlink => fs::metadata(&entry.path)
            .map(|m| m.is_dir())
            .unwrap_or(false),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// Immediate children of `dir`, sorted by file name. Hidden files and
/// ignore-file rules are not applied; every entry is listed.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, PathError> {
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .ignore(false)
        .parents(false)
        .hidden(false)
        .follow_links(false)
        .same_file_system(false)
        .max_depth(Some(1))
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut paths = Vec::new();
    for result in walker {
        let entry = result.map_err(|e| map_ignore_error(dir, e))?;
        // Skip the directory itself
        if entry.depth() == 0 {
            continue;
        }
        paths.push(entry.into_path());
    }
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Map ignore::Error to PathError
// ---------------------------------------------------------------------------

fn map_ignore_error(dir: &Path, e: ignore::Error) -> PathError {
    match e {
        ignore::Error::WithPath { path, err } => match *err {
            ignore::Error::Io(source) => PathError::DirectoryRead { path, source },
            other => PathError::DirectoryRead {
                path,
                source: std::io::Error::other(other.to_string()),
            },
        },
        ignore::Error::WithDepth { err, .. } => map_ignore_error(dir, *err),
        ignore::Error::Io(source) => PathError::DirectoryRead {
            path: dir.to_path_buf(),
            source,
        },
        other => PathError::DirectoryRead {
            path: dir.to_path_buf(),
            source: std::io::Error::other(other.to_string()),
        },
    }
}

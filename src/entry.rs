use std::fmt;
use std::fs::{FileType, Metadata};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::PathError;

/// One resolved filesystem object: where it lives, what `lstat` said about it
/// when it was resolved, and the children materialized beneath it.
///
/// Entries are built by the engine and never re-stat themselves. A directory
/// (or a glob root) carries children only down to the depth it was built with;
/// anything else has none.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) path: PathBuf,
    pub(crate) kind: EntryKind,
    pub(crate) metadata: Metadata,
    pub(crate) children: Vec<Entry>,
    pub(crate) glob: bool,
}

/// The kind of a resolved entry, taken from non-dereferencing metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,

    /// A directory.
    Dir,

    /// A symbolic link, represented as itself rather than its target.
    Symlink,

    /// Anything else (device files, pipes, sockets, etc.).
    Other,
}

impl EntryKind {
    pub(crate) fn from_file_type(ft: FileType) -> Self {
        if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else if ft.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        }
    }
}

impl Entry {
    pub(crate) fn new(path: PathBuf, metadata: Metadata) -> Self {
        Self {
            kind: EntryKind::from_file_type(metadata.file_type()),
            path,
            metadata,
            children: Vec::new(),
            glob: false,
        }
    }

    /// Absolute, cleaned path. For a glob root this is the expanded pattern itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, or an empty string for `/`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Metadata snapshot. For a glob root this describes the directory that
    /// contains the pattern, not any single match.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn children(&self) -> &[Entry] {
        &self.children
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    /// True when this entry stands for a glob pattern (with zero or several
    /// matches) rather than a single filesystem object.
    pub fn is_glob(&self) -> bool {
        self.glob
    }

    /// Length of the longest chain of children below this entry.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Every descendant, depth first: each child is followed by its own
    /// descendants. The root is appended last when `include_root` is set.
    pub fn flatten(&self, include_root: bool) -> Vec<&Entry> {
        let mut out = Vec::new();
        collect_refs(&self.children, &mut out);
        if include_root {
            out.push(self);
        }
        out
    }

    /// Owned form of [`flatten`](Entry::flatten), in the same order.
    ///
    /// Returned entries are detached: their children are moved into the
    /// sequence itself, so each one comes back with an empty `children`.
    pub fn into_flattened(mut self, include_root: bool) -> Vec<Entry> {
        let mut out = Vec::new();
        let children = std::mem::take(&mut self.children);
        drain_into(children, &mut out);
        if include_root {
            out.push(self);
        }
        out
    }
}

fn collect_refs<'a>(children: &'a [Entry], out: &mut Vec<&'a Entry>) {
    for child in children {
        out.push(child);
        collect_refs(&child.children, out);
    }
}

fn drain_into(children: Vec<Entry>, out: &mut Vec<Entry>) {
    for mut child in children {
        let grandchildren = std::mem::take(&mut child.children);
        out.push(child);
        drain_into(grandchildren, out);
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl AsRef<Path> for Entry {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Parses a path expression the way a `--path` flag would: resolved and
/// built one level deep, unfiltered.
impl FromStr for Entry {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::engine::build_tree(s, 1, &[])
    }
}

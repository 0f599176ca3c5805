use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;

use crate::entry::Entry;
use crate::error::PathError;

/// Decides whether an entry is kept.
///
/// Implement this for custom predicates. Filters are evaluated against entries
/// that have already been stat'ed, so most never fail; those that need to ask
/// the filesystem something more return [`PathError::FilterEvaluation`].
///
/// Any `Fn(&Entry) -> bool` closure is a filter as well.
///
/// # Example
///
/// ```rust
/// use pathtree::{Entry, Filter, PathError};
///
/// struct ExtensionFilter(&'static str);
///
/// impl Filter for ExtensionFilter {
///     fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
///         Ok(entry.path().extension().map(|e| e == self.0).unwrap_or(false))
///     }
/// }
/// ```
pub trait Filter: Send + Sync {
    /// Returns `true` if this entry should be kept.
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError>;

    /// Decide from the path alone, for paths that can no longer be stat'ed.
    /// `None` means the filter needs metadata and cannot decide.
    fn is_match_path(&self, _path: &Path) -> Option<bool> {
        None
    }
}

impl<F> Filter for F
where
    F: Fn(&Entry) -> bool + Send + Sync,
{
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        Ok(self(entry))
    }
}

/// True when a path that cannot be stat'ed passes every filter on its path
/// alone. A filter that needs metadata rejects it.
pub fn path_passes_all(filters: &[&dyn Filter], path: &Path) -> bool {
    filters
        .iter()
        .all(|filter| filter.is_match_path(path).unwrap_or(false))
}

/// True when `entry` passes every filter. Stops at the first rejection or error.
pub fn passes_all(filters: &[&dyn Filter], entry: &Entry) -> Result<bool, PathError> {
    for filter in filters {
        if !filter.is_match(entry)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Keeps entries whose absolute path or base name matches a regex.
///
/// The regex is compiled once by the caller; evaluation never recompiles it.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }

    /// Compile `pattern` and wrap it.
    pub fn from_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::new)
    }
}

impl Filter for RegexFilter {
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        Ok(self.regex.is_match(&entry.path().to_string_lossy())
            || self.regex.is_match(&entry.name()))
    }

    fn is_match_path(&self, path: &Path) -> Option<bool> {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        Some(self.regex.is_match(&path.to_string_lossy()) || self.regex.is_match(&name))
    }
}

/// Keeps entries modified within `[from, to]`, both ends inclusive.
#[derive(Debug, Clone, Copy)]
pub struct DateRangeFilter {
    from: SystemTime,
    to: SystemTime,
}

impl DateRangeFilter {
    pub fn new(from: SystemTime, to: SystemTime) -> Self {
        Self { from, to }
    }
}

impl Filter for DateRangeFilter {
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        let modified = entry
            .metadata()
            .modified()
            .map_err(|e| PathError::FilterEvaluation {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(modified >= self.from && modified <= self.to)
    }
}

/// Keeps entries whose absolute path is **not** in the skip set.
#[derive(Debug, Clone, Default)]
pub struct SkipSetFilter {
    skip: HashSet<PathBuf>,
}

impl SkipSetFilter {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            skip: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter for SkipSetFilter {
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        Ok(!self.skip.contains(entry.path()))
    }

    fn is_match_path(&self, path: &Path) -> Option<bool> {
        Some(!self.skip.contains(path))
    }
}

/// Keeps entries whose permission bits lie within `[min, max]`, inclusive.
#[derive(Debug, Clone, Copy)]
pub struct PermissionRangeFilter {
    min: u32,
    max: u32,
}

impl PermissionRangeFilter {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

impl Filter for PermissionRangeFilter {
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        let mode = permission_bits(entry.metadata());
        Ok(mode >= self.min && mode <= self.max)
    }
}

/// Permission bits (`0o7777` mask) of a metadata snapshot.
#[cfg(unix)]
pub fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Permission bits of a metadata snapshot. Only the read-only flag is known
/// here, so this reports `0o444` or `0o666`.
#[cfg(not(unix))]
pub fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}

/// Keeps entries whose size in bytes lies within `[min, max]`, inclusive.
/// Directories always pass.
#[derive(Debug, Clone, Copy)]
pub struct SizeRangeFilter {
    min: u64,
    max: u64,
}

impl SizeRangeFilter {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

impl Filter for SizeRangeFilter {
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        if entry.is_dir() {
            return Ok(true);
        }
        let size = entry.metadata().len();
        Ok(size >= self.min && size <= self.max)
    }
}

/// Keeps directories only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirFilter;

impl Filter for DirFilter {
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        Ok(entry.is_dir())
    }
}

/// Keeps everything that is not a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFilter;

impl Filter for FileFilter {
    fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
        Ok(!entry.is_dir())
    }
}

/// Accepts every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

impl Filter for AlwaysTrue {
    fn is_match(&self, _entry: &Entry) -> Result<bool, PathError> {
        Ok(true)
    }
}

/// Rejects every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFalse;

impl Filter for AlwaysFalse {
    fn is_match(&self, _entry: &Entry) -> Result<bool, PathError> {
        Ok(false)
    }
}

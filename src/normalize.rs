//! Turns a raw path expression into absolute candidate paths.
//!
//! Order matters: whitespace is trimmed and a leading `~` expanded before the
//! path is made absolute and cleaned, and only then is it checked for glob
//! metacharacters.

use std::path::{is_separator, Component, Path, PathBuf};

use tracing::debug;

use crate::error::PathError;
use crate::glob::{has_glob_meta, CompiledGlob};

/// The result of normalizing one raw path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The absolute, cleaned expression. Still contains wildcards when
    /// [`is_glob`](Normalized::is_glob) is set.
    pub pattern: PathBuf,

    /// Concrete paths the expression denotes. A literal path yields itself
    /// whether or not it exists; a glob yields its existing matches, possibly none.
    pub candidates: Vec<PathBuf>,

    /// Whether the expression contained glob metacharacters.
    pub is_glob: bool,

    /// For globs, the deepest wildcard-free directory of the pattern.
    pub glob_base: Option<PathBuf>,
}

/// Expand `raw` into candidate paths.
///
/// # Errors
///
/// [`PathError::UserLookup`] when `~` cannot be expanded,
/// [`PathError::PathResolution`] when the working directory is unavailable,
/// [`PathError::GlobSyntax`] for a malformed pattern. A glob with no matches
/// is not an error.
pub fn normalize(raw: &str) -> Result<Normalized, PathError> {
    let trimmed = raw.trim();
    let expanded = expand_tilde(trimmed)?;
    let pattern = clean(&absolute(&expanded)?);

    let text = pattern.to_string_lossy();
    if !has_glob_meta(&text) {
        return Ok(Normalized {
            candidates: vec![pattern.clone()],
            pattern,
            is_glob: false,
            glob_base: None,
        });
    }

    let glob = CompiledGlob::new(&pattern)?;
    let candidates = glob.expand();
    debug!(pattern = %text, matches = candidates.len(), "expanded glob");

    Ok(Normalized {
        glob_base: Some(glob.base().to_path_buf()),
        pattern,
        candidates,
        is_glob: true,
    })
}

/// Home directory of the invoking user, from the environment.
pub fn home_dir() -> Result<PathBuf, PathError> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    match std::env::var_os(var) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => Err(PathError::UserLookup(format!("{var} is not set"))),
    }
}

/// Replace a leading `~` (alone, or followed by a separator) with the home
/// directory. A `~` anywhere else is part of a file name.
fn expand_tilde(path: &str) -> Result<PathBuf, PathError> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(PathBuf::from(path));
    };
    match rest.chars().next() {
        None => home_dir(),
        Some(c) if is_separator(c) => {
            let rest = rest.trim_start_matches(is_separator);
            Ok(home_dir()?.join(rest))
        }
        Some(_) => Ok(PathBuf::from(path)),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, PathError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| PathError::PathResolution {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(path))
}

/// Lexically collapse `.`, `..` and redundant separators. `..` never climbs
/// above the root.
pub(crate) fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

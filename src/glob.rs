use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::trace;

use crate::error::PathError;

/// Characters that make a path an expansion pattern rather than a literal path.
const GLOB_META: &[char] = &['*', '!', '?', '[', ']'];

pub(crate) fn has_glob_meta(s: &str) -> bool {
    s.contains(GLOB_META)
}

enum Segment {
    Literal(OsString),
    Pattern(GlobMatcher),
}

/// A compiled, absolute glob pattern split into its literal base directory and
/// the per-component segments below it.
pub(crate) struct CompiledGlob {
    base: PathBuf,
    segments: Vec<Segment>,
}

impl CompiledGlob {
    /// Compile every wildcard component up front so a malformed pattern fails
    /// even when its base directory does not exist.
    pub(crate) fn new(pattern: &Path) -> Result<Self, PathError> {
        let mut base = PathBuf::new();
        let mut segments = Vec::new();

        for component in pattern.components() {
            let os = component.as_os_str();
            let text = os.to_string_lossy();
            let is_pattern = matches!(component, Component::Normal(_)) && has_glob_meta(&text);

            if is_pattern {
                let matcher = GlobBuilder::new(&text)
                    .literal_separator(true)
                    .backslash_escape(cfg!(unix))
                    .build()
                    .map_err(|e| PathError::GlobSyntax {
                        pattern: pattern.display().to_string(),
                        message: e.to_string(),
                    })?
                    .compile_matcher();
                segments.push(Segment::Pattern(matcher));
            } else if segments.is_empty() {
                base.push(os);
            } else {
                segments.push(Segment::Literal(os.to_os_string()));
            }
        }

        Ok(Self { base, segments })
    }

    /// Deepest directory of the pattern that contains no wildcard.
    pub(crate) fn base(&self) -> &Path {
        &self.base
    }

    /// Every existing path matching the pattern, sorted by name within each
    /// directory. Unreadable directories contribute no matches.
    pub(crate) fn expand(&self) -> Vec<PathBuf> {
        let mut current = vec![self.base.clone()];

        for segment in &self.segments {
            let mut next = Vec::new();
            for dir in &current {
                match segment {
                    Segment::Literal(name) => next.push(dir.join(name)),
                    Segment::Pattern(matcher) => match_dir(dir, matcher, &mut next),
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }

        current.retain(|p| fs::symlink_metadata(p).is_ok());
        current
    }
}

fn match_dir(dir: &Path, matcher: &GlobMatcher, out: &mut Vec<PathBuf>) {
    if !fs::metadata(dir).map(|m| m.is_dir()).unwrap_or(false) {
        return;
    }
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            trace!(dir = %dir.display(), error = %e, "skipping unreadable directory during glob");
            return;
        }
    };

    let mut names: Vec<OsString> = read
        .filter_map(Result::ok)
        .map(|de| de.file_name())
        .filter(|name| matcher.is_match(Path::new(name)))
        .collect();
    names.sort();

    out.extend(names.into_iter().map(|name| dir.join(name)));
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    // Normalization
    #[error("error getting current user: {0}")]
    UserLookup(String),

    #[error("error getting absolute path for {}", path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to glob input path {pattern}: {message}")]
    GlobSyntax { pattern: String, message: String },

    // Traversal
    #[error("error stating file: {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading directory: {}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Predicates
    #[error("filter failed on {}: {message}", path.display())]
    FilterEvaluation { path: PathBuf, message: String },

    // Watch adapter
    #[error("watch error: {0}")]
    Watch(String),
}

impl PathError {
    /// The path this error occurred at, if applicable.
    /// Callers use this to report the offending path without matching on variants.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::PathResolution { path, .. }
            | Self::Stat { path, .. }
            | Self::DirectoryRead { path, .. }
            | Self::FilterEvaluation { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether the failure means the target does not exist, as opposed to
    /// being unreadable or malformed.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Stat { source, .. } | Self::DirectoryRead { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

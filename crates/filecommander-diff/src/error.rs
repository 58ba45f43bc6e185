//! Error types for directory comparison.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a comparison before it starts or while it walks a root.
#[derive(Debug, Error)]
pub enum DiffError {
    /// An exclude pattern failed to compile.
    #[error("Invalid exclude pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A root could not be listed.
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiffError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

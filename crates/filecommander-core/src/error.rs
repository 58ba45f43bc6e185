//! Error types for file operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can end a job's execution.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationError {
    /// The source vanished between admission and execution.
    #[error("Source not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The destination of a move is already occupied.
    #[error("Destination already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// A path cannot be copied or moved onto or into itself.
    #[error("Cannot copy/move {} into itself ({})", path.display(), destination.display())]
    SourceIsAncestor { path: PathBuf, destination: PathBuf },

    /// Permission, disk or other I/O failure.
    #[error("I/O error at {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// The job was cancelled cooperatively.
    #[error("Operation cancelled")]
    Cancelled,
}

impl OperationError {
    /// Create an error from an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::Io {
                path,
                message: source.to_string(),
            },
        }
    }

    /// Create a generic I/O error from a message.
    pub fn other(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error represents a cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let err = OperationError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, OperationError::NotFound { .. }));

        let err = OperationError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        match err {
            OperationError::Io { message, .. } => assert!(message.contains("denied")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_messages() {
        let err = OperationError::AlreadyExists {
            path: PathBuf::from("/dst/a.txt"),
        };
        assert_eq!(err.to_string(), "Destination already exists: /dst/a.txt");
        assert!(OperationError::Cancelled.is_cancelled());
    }
}

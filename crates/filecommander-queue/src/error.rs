//! Admission errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why a job was refused at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// A copy of the same source is still pending, so it may not be moved or deleted.
    PendingCopy,
    /// The same operation onto the same destination is already queued.
    AlreadyQueued,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingCopy => f.write_str("a copy of this path is still pending"),
            Self::AlreadyQueued => f.write_str("the same operation is already queued"),
        }
    }
}

/// Errors returned synchronously by [`TaskQueue::enqueue`](crate::TaskQueue::enqueue).
///
/// A rejected job never enters tracking and raises no events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The job collides with one already queued or running.
    #[error("Conflict on {}: {reason}", path.display())]
    Conflict { path: PathBuf, reason: ConflictReason },

    /// The job is missing a path it needs.
    #[error("Invalid job: {reason}")]
    InvalidJob { reason: String },

    /// The queue no longer accepts work.
    #[error("Queue has been shut down")]
    ShutDown,
}

impl QueueError {
    /// Whether this is an admission conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

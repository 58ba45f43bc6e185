//! File operation jobs and their lifecycle.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::drive::{DrivePairKey, DriveResolver};

/// Process-unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum OperationKind {
    Copy,
    Move,
    Delete,
}

impl OperationKind {
    /// Whether this operation changes the structure of the source tree.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Move | Self::Delete)
    }

    /// Whether this operation needs a destination path.
    pub fn needs_destination(&self) -> bool {
        !matches!(self, Self::Delete)
    }
}

/// Lifecycle state of a job.
///
/// Transitions only move forward: `Queued -> Running -> {Completed | Failed | Cancelled}`,
/// with `Queued -> Cancelled` allowed for jobs cancelled before they start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job has left the queue for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

/// A single requested copy, move or delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// What the job does.
    pub operation: OperationKind,
    /// Path being copied, moved or deleted.
    pub source: PathBuf,
    /// Target path (`None` for deletes).
    pub destination: Option<PathBuf>,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Progress in percent, 0 to 100.
    pub progress: u8,
    /// Failure or cancellation reason.
    pub error: Option<String>,
    /// When the job was accepted into the queue.
    pub queued_at: DateTime<Utc>,
    /// When execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(operation: OperationKind, source: impl Into<PathBuf>, destination: Option<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            operation,
            source: source.into(),
            destination,
            status: JobStatus::Queued,
            progress: 0,
            error: None,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Create a copy job.
    pub fn copy(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Copy, source, Some(destination.into()))
    }

    /// Create a move job.
    pub fn move_to(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Move, source, Some(destination.into()))
    }

    /// Create a delete job.
    pub fn delete(target: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Delete, target, None)
    }

    /// Destination path, or an empty path for deletes.
    pub fn destination_path(&self) -> &Path {
        self.destination.as_deref().unwrap_or(Path::new(""))
    }

    /// File name of the source, for status messages.
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    /// Compute the drive-pair key this job serializes on.
    pub fn drive_pair_key(&self, resolver: &dyn DriveResolver) -> DrivePairKey {
        let source_root = resolver.root_of(&self.source);
        let dest_root = self.destination.as_deref().and_then(|d| resolver.root_of(d));
        DrivePairKey::new(source_root.as_deref(), dest_root.as_deref())
    }

    /// Move to `next` if the transition is legal. Returns whether it happened.
    ///
    /// Stamps `started_at` on entering `Running` and `completed_at` on
    /// entering a terminal state. Completion forces progress to 100.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        match next {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Completed => {
                self.progress = 100;
                self.completed_at = Some(Utc::now());
            }
            JobStatus::Failed | JobStatus::Cancelled => self.completed_at = Some(Utc::now()),
            JobStatus::Queued => {}
        }
        true
    }

    /// Record progress, never moving backwards.
    pub fn set_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }
}

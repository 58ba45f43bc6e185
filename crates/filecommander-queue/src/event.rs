//! Events broadcast by the task queue.

use filecommander_core::{Job, JobId};

/// A change observed on the queue.
///
/// Lifecycle variants carry a snapshot of the job taken at the moment of the
/// transition.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// The job passed admission.
    JobQueued(Job),
    /// The job acquired its drive-pair lane and is executing.
    JobStarted(Job),
    /// The job finished successfully.
    JobCompleted(Job),
    /// The job failed; `error` holds the reason.
    JobFailed(Job),
    /// The job was cancelled before or during execution.
    JobCancelled(Job),
    /// Status text from the executor.
    StatusChanged { id: JobId, message: String },
    /// Progress from the executor.
    ProgressChanged { id: JobId, percent: u8 },
    /// Dispatch was paused or resumed.
    QueueStateChanged { paused: bool },
}

impl QueueEvent {
    /// The job this event concerns, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::JobQueued(job)
            | Self::JobStarted(job)
            | Self::JobCompleted(job)
            | Self::JobFailed(job)
            | Self::JobCancelled(job) => Some(job.id),
            Self::StatusChanged { id, .. } | Self::ProgressChanged { id, .. } => Some(*id),
            Self::QueueStateChanged { .. } => None,
        }
    }

    /// Whether this event reports a job reaching a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::JobCompleted(_) | Self::JobFailed(_) | Self::JobCancelled(_)
        )
    }
}

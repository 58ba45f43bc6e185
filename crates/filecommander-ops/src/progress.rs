//! Progress reporting for executing jobs.

use std::sync::Arc;

use filecommander_core::JobId;
use tokio::sync::mpsc;

/// An update emitted while a job executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    /// Human-readable status text.
    Status { id: JobId, message: String },
    /// Percent complete, never decreasing for a given job.
    Progress { id: JobId, percent: u8 },
}

impl ExecutorEvent {
    /// The job this event belongs to.
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Status { id, .. } | Self::Progress { id, .. } => *id,
        }
    }
}

/// Receives status and progress updates from the executor.
///
/// Called from blocking worker threads, so implementations must not block
/// for long.
pub trait ProgressSink: Send + Sync {
    /// A status message for the job.
    fn status(&self, id: JobId, message: String);

    /// A new progress percentage for the job.
    fn progress(&self, id: JobId, percent: u8);
}

impl ProgressSink for mpsc::UnboundedSender<ExecutorEvent> {
    fn status(&self, id: JobId, message: String) {
        let _ = self.send(ExecutorEvent::Status { id, message });
    }

    fn progress(&self, id: JobId, percent: u8) {
        let _ = self.send(ExecutorEvent::Progress { id, percent });
    }
}

/// Converts processed units (bytes or entries) into throttled percentages.
///
/// Only emits when the percentage increases, and holds back 100 until the
/// executor reports completion.
pub(crate) struct ProgressTracker {
    id: JobId,
    sink: Arc<dyn ProgressSink>,
    total: u64,
    done: u64,
    last: u8,
}

impl ProgressTracker {
    pub fn new(id: JobId, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            id,
            sink,
            total: 0,
            done: 0,
            last: 0,
        }
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    pub fn advance(&mut self, units: u64) {
        self.done = self.done.saturating_add(units);
        if self.total == 0 {
            return;
        }
        let percent = ((self.done.min(self.total) * 100) / self.total).min(99) as u8;
        if percent > self.last {
            self.last = percent;
            self.sink.progress(self.id, percent);
        }
    }
}

//! Executes exactly one job at a time, reporting status and progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use filecommander_core::{Job, JobId, OperationError, OperationKind, QueueConfig};
use tokio_util::sync::CancellationToken;

use crate::copy::copy_path;
use crate::delete::delete_path;
use crate::move_op::move_path;
use crate::progress::{ProgressSink, ProgressTracker};

/// Tunables for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Buffer size for the streaming copy loop.
    pub buffer_size: usize,
    /// Copy the source modification time onto copied files.
    pub preserve_timestamps: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for ExecutorOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            buffer_size: config.effective_buffer_size(),
            preserve_timestamps: config.preserve_timestamps,
        }
    }
}

/// State handed to the blocking worker for one job.
pub(crate) struct ExecContext {
    pub cancel: CancellationToken,
    pub options: ExecutorOptions,
}

impl ExecContext {
    pub fn check_cancelled(&self) -> Result<(), OperationError> {
        if self.cancel.is_cancelled() {
            Err(OperationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Performs copy, move and delete jobs against the real filesystem.
///
/// The executor takes no locks of its own; callers decide what may run
/// concurrently.
#[derive(Clone)]
pub struct Executor {
    sink: Arc<dyn ProgressSink>,
    options: ExecutorOptions,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create an executor reporting to `sink`.
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            options: ExecutorOptions::default(),
        }
    }

    /// Override the executor options.
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// The options in effect.
    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Run whichever operation the job names.
    pub async fn execute(&self, job: &Job, cancel: &CancellationToken) -> Result<(), OperationError> {
        match job.operation {
            OperationKind::Copy => self.copy(job, cancel).await,
            OperationKind::Move => self.move_to(job, cancel).await,
            OperationKind::Delete => self.delete(job, cancel).await,
        }
    }

    /// Copy a file or directory tree.
    pub async fn copy(&self, job: &Job, cancel: &CancellationToken) -> Result<(), OperationError> {
        let destination = require_destination(job)?;
        self.run(job, cancel, move |ctx, source, tracker| {
            copy_path(ctx, source, &destination, tracker).map(|_| ())
        })
        .await
    }

    /// Rename a file or directory onto a destination that must not exist.
    pub async fn move_to(&self, job: &Job, cancel: &CancellationToken) -> Result<(), OperationError> {
        let destination = require_destination(job)?;
        self.run(job, cancel, move |ctx, source, tracker| {
            move_path(ctx, source, &destination, tracker)
        })
        .await
    }

    /// Remove a file or directory tree.
    pub async fn delete(&self, job: &Job, cancel: &CancellationToken) -> Result<(), OperationError> {
        self.run(job, cancel, delete_path).await
    }

    /// Shared wrapper: status messages, 0%/100% reporting, and the hop onto a
    /// blocking thread.
    async fn run<F>(&self, job: &Job, cancel: &CancellationToken, work: F) -> Result<(), OperationError>
    where
        F: FnOnce(&ExecContext, &Path, &mut ProgressTracker) -> Result<(), OperationError>
            + Send
            + 'static,
    {
        let id = job.id;
        let name = job.display_name();
        let verbs = Verbs::of(job.operation);

        self.sink.status(id, format!("{} {}", verbs.ongoing, name));
        self.sink.progress(id, 0);

        let result = if cancel.is_cancelled() {
            Err(OperationError::Cancelled)
        } else {
            let ctx = ExecContext {
                cancel: cancel.clone(),
                options: self.options.clone(),
            };
            let sink = Arc::clone(&self.sink);
            let source = job.source.clone();

            tokio::task::spawn_blocking(move || {
                let mut tracker = ProgressTracker::new(id, sink);
                work(&ctx, &source, &mut tracker)
            })
            .await
            .unwrap_or_else(|e| Err(OperationError::other(&job.source, format!("Task failed: {e}"))))
        };

        self.report_outcome(id, &name, &verbs, &result);
        result
    }

    fn report_outcome(&self, id: JobId, name: &str, verbs: &Verbs, result: &Result<(), OperationError>) {
        match result {
            Ok(()) => {
                self.sink.progress(id, 100);
                self.sink.status(id, format!("{} {}", verbs.done, name));
                tracing::debug!(job = %id, "{} {}", verbs.done, name);
            }
            Err(OperationError::Cancelled) => {
                self.sink.status(id, format!("{} cancelled: {}", verbs.noun, name));
                tracing::debug!(job = %id, "{} cancelled: {}", verbs.noun, name);
            }
            Err(e) => {
                self.sink.status(id, format!("{} failed: {}", verbs.noun, e));
                tracing::warn!(job = %id, "{} failed: {}", verbs.noun, e);
            }
        }
    }
}

/// Wording for status messages.
struct Verbs {
    ongoing: &'static str,
    done: &'static str,
    noun: &'static str,
}

impl Verbs {
    fn of(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Copy => Self {
                ongoing: "Copying",
                done: "Copied",
                noun: "Copy",
            },
            OperationKind::Move => Self {
                ongoing: "Moving",
                done: "Moved",
                noun: "Move",
            },
            OperationKind::Delete => Self {
                ongoing: "Deleting",
                done: "Deleted",
                noun: "Delete",
            },
        }
    }
}

fn require_destination(job: &Job) -> Result<PathBuf, OperationError> {
    job.destination
        .clone()
        .filter(|d| !d.as_os_str().is_empty())
        .ok_or_else(|| OperationError::other(&job.source, format!("{} requires a destination", job.operation)))
}

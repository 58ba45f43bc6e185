//! The task queue: admission, dispatch, pause, cancellation and shutdown.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use filecommander_core::{
    DrivePairKey, DriveResolver, Job, JobId, JobStatus, QueueConfig,
};
use filecommander_ops::{Executor, ExecutorOptions, ProgressSink};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::event::QueueEvent;
use crate::lane::{PairLock, Ticket};
use crate::tracking::{JobEntry, JobTracker};

const CANCELLED_BEFORE_START: &str = "Cancelled before start";
const CANCELLED_BY_SHUTDOWN: &str = "Cancelled by shutdown";

/// State shared by the queue handle, the dispatch loop and execution units.
struct Shared {
    tracker: Arc<JobTracker>,
    /// One lane per drive pair seen, created on first use and never pruned.
    /// The key count is bounded by the number of distinct mount pairs.
    lanes: DashMap<DrivePairKey, Arc<PairLock>>,
    resolver: Arc<dyn DriveResolver>,
    executor: Executor,
    events: broadcast::Sender<QueueEvent>,
    paused: watch::Sender<bool>,
    shutdown: CancellationToken,
}

impl Shared {
    fn emit(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Cancel a job that never started, emitting the event at most once.
    fn cancel_unstarted(&self, entry: &JobEntry, reason: &str) {
        if let Some(job) = entry.cancel_if_queued(reason) {
            tracing::debug!(job = %entry.id, "{}: {}", reason, entry.source.display());
            self.emit(QueueEvent::JobCancelled(job));
            self.tracker.release(entry);
        } else {
            self.tracker.release(entry);
        }
    }

    fn lane(&self, key: &DrivePairKey) -> Arc<PairLock> {
        Arc::clone(self.lanes.entry(key.clone()).or_default().value())
    }
}

/// Forwards executor output onto the queue's event channel.
///
/// Runs synchronously on the executor's worker thread, so progress events
/// are always broadcast before the job's terminal event.
struct QueueSink {
    tracker: Arc<JobTracker>,
    events: broadcast::Sender<QueueEvent>,
}

impl ProgressSink for QueueSink {
    fn status(&self, id: JobId, message: String) {
        let _ = self.events.send(QueueEvent::StatusChanged { id, message });
    }

    fn progress(&self, id: JobId, percent: u8) {
        if let Some(entry) = self.tracker.get(id) {
            entry.set_progress(percent);
        }
        let _ = self.events.send(QueueEvent::ProgressChanged { id, percent });
    }
}

/// A concurrent file operation queue.
///
/// Jobs are drawn in submission order by a background dispatch loop. Jobs
/// sharing a drive-pair key run one at a time in the order drawn; jobs on
/// different pairs run in parallel with no cap. Must be created inside a
/// tokio runtime.
pub struct TaskQueue {
    shared: Arc<Shared>,
    config: QueueConfig,
    intake: Mutex<Option<mpsc::UnboundedSender<Arc<JobEntry>>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("config", &self.config)
            .field("paused", &self.is_paused())
            .field("live_jobs", &self.shared.tracker.len())
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    /// Create a queue resolving drive roots as `config.drive_keys` says.
    pub fn new(config: QueueConfig) -> Self {
        let resolver: Arc<dyn DriveResolver> = Arc::from(config.drive_keys.resolver());
        Self::with_resolver(config, resolver)
    }

    /// Create a queue with a custom drive resolver.
    pub fn with_resolver(config: QueueConfig, resolver: Arc<dyn DriveResolver>) -> Self {
        let tracker = Arc::new(JobTracker::default());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let sink = QueueSink {
            tracker: Arc::clone(&tracker),
            events: events.clone(),
        };
        let executor = Executor::new(Arc::new(sink)).with_options(ExecutorOptions::from(&config));
        let (paused, _) = watch::channel(!config.auto_start);

        let shared = Arc::new(Shared {
            tracker,
            lanes: DashMap::new(),
            resolver,
            executor,
            events,
            paused,
            shutdown: CancellationToken::new(),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch_loop(Arc::clone(&shared), rx));

        tracing::debug!(paused = !config.auto_start, "Task queue started");

        Self {
            shared,
            config,
            intake: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// The configuration the queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Subscribe to queue events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    /// Submit a job.
    ///
    /// Admission is decided synchronously. A rejected job never enters
    /// tracking and raises no events. An accepted job is reset to `Queued`
    /// and stamped with the current time.
    pub fn enqueue(&self, mut job: Job) -> Result<JobId, QueueError> {
        validate(&job)?;

        job.status = JobStatus::Queued;
        job.progress = 0;
        job.error = None;
        job.started_at = None;
        job.completed_at = None;
        job.queued_at = chrono::Utc::now();

        let intake = lock(&self.intake);
        let Some(tx) = intake.as_ref() else {
            return Err(QueueError::ShutDown);
        };

        let entry = self.shared.tracker.admit(job).inspect_err(|e| {
            tracing::debug!("Rejected job: {}", e);
        })?;
        let snapshot = entry.snapshot();
        tracing::debug!(
            job = %snapshot.id,
            "Queued {} {}",
            snapshot.operation,
            snapshot.source.display()
        );
        // Announce before handing off so JobQueued always precedes JobStarted.
        self.shared.emit(QueueEvent::JobQueued(snapshot));

        if tx.send(Arc::clone(&entry)).is_err() {
            self.shared.cancel_unstarted(&entry, CANCELLED_BY_SHUTDOWN);
            return Err(QueueError::ShutDown);
        }
        Ok(entry.id)
    }

    /// Stop drawing new jobs. Running jobs continue.
    pub fn pause(&self) {
        self.set_paused(true);
    }

    /// Resume drawing jobs.
    pub fn resume(&self) {
        self.set_paused(false);
    }

    fn set_paused(&self, paused: bool) {
        let changed = self.shared.paused.send_if_modified(|current| {
            if *current == paused {
                false
            } else {
                *current = paused;
                true
            }
        });
        if changed {
            tracing::info!("Queue {}", if paused { "paused" } else { "resumed" });
            self.shared.emit(QueueEvent::QueueStateChanged { paused });
        }
    }

    /// Whether dispatch is paused.
    pub fn is_paused(&self) -> bool {
        *self.shared.paused.borrow()
    }

    /// Cancel every job that has not started. Returns how many were cancelled.
    pub fn clear_queue(&self) -> usize {
        let mut cancelled = 0;
        for entry in self.shared.tracker.entries() {
            if let Some(job) = entry.cancel_if_queued(CANCELLED_BEFORE_START) {
                entry.cancel.cancel();
                self.shared.emit(QueueEvent::JobCancelled(job));
                self.shared.tracker.release(&entry);
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!(count = cancelled, "Cleared queued jobs");
        }
        cancelled
    }

    /// Cancel one job.
    ///
    /// A queued job is cancelled immediately. A running job is asked to stop
    /// and becomes `Cancelled` once the executor notices. Returns false if
    /// the job is unknown or already finished.
    pub fn cancel_job(&self, id: JobId) -> bool {
        let Some(entry) = self.shared.tracker.get(id) else {
            return false;
        };

        entry.cancel.cancel();
        if let Some(job) = entry.cancel_if_queued(CANCELLED_BEFORE_START) {
            tracing::debug!(job = %id, "Cancelled queued job");
            self.shared.emit(QueueEvent::JobCancelled(job));
            self.shared.tracker.release(&entry);
            return true;
        }

        let running = entry.status() == JobStatus::Running;
        if running {
            tracing::debug!(job = %id, "Requested cancellation of running job");
        }
        running
    }

    /// Snapshots of all jobs that are queued or running, oldest first.
    pub fn active_jobs(&self) -> Vec<Job> {
        self.shared
            .tracker
            .entries()
            .iter()
            .map(|e| e.snapshot())
            .filter(|j| !j.status.is_terminal())
            .collect()
    }

    /// Snapshots of the live jobs whose source is `path`.
    pub fn jobs_for_path(&self, path: impl AsRef<Path>) -> Vec<Job> {
        self.shared.tracker.jobs_for_path(path.as_ref())
    }

    /// Number of jobs waiting to start.
    pub fn queued_count(&self) -> usize {
        self.shared
            .tracker
            .entries()
            .iter()
            .filter(|e| e.status() == JobStatus::Queued)
            .count()
    }

    /// Snapshot of a live job.
    pub fn job(&self, id: JobId) -> Option<Job> {
        self.shared.tracker.get(id).map(|e| e.snapshot())
    }

    /// Resolve once every accepted job has reached a terminal state.
    ///
    /// Never resolves while paused with jobs waiting.
    pub async fn wait_idle(&self) {
        self.shared.tracker.wait_idle().await;
    }

    /// Stop accepting and drawing jobs, then wait for running jobs to finish.
    ///
    /// Jobs not yet running are cancelled. Later calls to [`enqueue`](Self::enqueue)
    /// fail with [`QueueError::ShutDown`].
    pub async fn shutdown(&self) {
        lock(&self.intake).take();
        self.shared.shutdown.cancel();

        let handle = lock(&self.dispatcher).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Dispatch loop ended abnormally: {}", e);
            }
            tracing::info!("Task queue shut down");
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn validate(job: &Job) -> Result<(), QueueError> {
    if job.source.as_os_str().is_empty() {
        return Err(QueueError::InvalidJob {
            reason: "source path is empty".to_string(),
        });
    }
    if job.operation.needs_destination() && job.destination_path().as_os_str().is_empty() {
        return Err(QueueError::InvalidJob {
            reason: format!("{} requires a destination", job.operation),
        });
    }
    Ok(())
}

/// Draw jobs in order and start an execution unit for each.
async fn dispatch_loop(shared: Arc<Shared>, mut intake: mpsc::UnboundedReceiver<Arc<JobEntry>>) {
    let mut running = JoinSet::new();
    let mut paused = shared.paused.subscribe();

    loop {
        let entry = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            next = intake.recv() => match next {
                Some(entry) => entry,
                None => break,
            },
        };

        let resumed = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => false,
            state = paused.wait_for(|p| !*p) => state.is_ok(),
        };
        if !resumed {
            shared.cancel_unstarted(&entry, CANCELLED_BY_SHUTDOWN);
            break;
        }

        reap(&mut running);

        if entry.status() != JobStatus::Queued {
            // Cancelled while buffered.
            shared.tracker.release(&entry);
            continue;
        }

        let Some(key) = resolve_key(&shared, &entry).await else {
            shared.cancel_unstarted(&entry, CANCELLED_BY_SHUTDOWN);
            break;
        };
        let ticket = shared.lane(&key).enter();
        tracing::debug!(job = %entry.id, pair = %key, "Dispatching");
        running.spawn(run_job(Arc::clone(&shared), entry, key, ticket));
    }

    intake.close();
    while let Ok(entry) = intake.try_recv() {
        shared.cancel_unstarted(&entry, CANCELLED_BY_SHUTDOWN);
    }

    while let Some(result) = running.join_next().await {
        if let Err(e) = result {
            tracing::warn!("Execution unit ended abnormally: {}", e);
        }
    }
}

/// Resolve the job's drive pair on the blocking pool, since mount lookups
/// stat every ancestor. `None` means shutdown arrived first.
async fn resolve_key(shared: &Shared, entry: &JobEntry) -> Option<DrivePairKey> {
    let job = entry.snapshot();
    let resolver = Arc::clone(&shared.resolver);
    let lookup = tokio::task::spawn_blocking(move || job.drive_pair_key(resolver.as_ref()));

    tokio::select! {
        biased;
        _ = shared.shutdown.cancelled() => None,
        key = lookup => Some(key.unwrap_or_else(|e| {
            tracing::warn!("Drive lookup for {} failed: {}", entry.source.display(), e);
            DrivePairKey::new(None, None)
        })),
    }
}

fn reap(running: &mut JoinSet<()>) {
    while let Some(result) = running.try_join_next() {
        if let Err(e) = result {
            tracing::warn!("Execution unit ended abnormally: {}", e);
        }
    }
}

/// Execute one job under its drive-pair lane.
async fn run_job(shared: Arc<Shared>, entry: Arc<JobEntry>, key: DrivePairKey, mut ticket: Ticket) {
    let acquired = tokio::select! {
        biased;
        _ = shared.shutdown.cancelled() => false,
        _ = entry.cancel.cancelled() => false,
        _ = ticket.acquire() => true,
    };
    if !acquired {
        let reason = if shared.shutdown.is_cancelled() {
            CANCELLED_BY_SHUTDOWN
        } else {
            CANCELLED_BEFORE_START
        };
        shared.cancel_unstarted(&entry, reason);
        return;
    }

    let guard = ticket.into_guard();
    if shared.shutdown.is_cancelled() {
        shared.cancel_unstarted(&entry, CANCELLED_BY_SHUTDOWN);
        return;
    }

    let Some(started) = entry.transition(JobStatus::Running, None) else {
        // Cancelled between drawing and acquiring the lane.
        shared.tracker.release(&entry);
        return;
    };
    tracing::info!(
        job = %entry.id,
        pair = %key,
        "Started {} {}",
        started.operation,
        started.source.display()
    );
    shared.emit(QueueEvent::JobStarted(started.clone()));

    let result = shared.executor.execute(&started, &entry.cancel).await;

    let (status, error) = match result {
        Ok(()) => (JobStatus::Completed, None),
        Err(e) if e.is_cancelled() => (JobStatus::Cancelled, Some(e.to_string())),
        Err(e) => (JobStatus::Failed, Some(e.to_string())),
    };
    if let Some(job) = entry.transition(status, error) {
        announce_finished(&shared, job);
    }
    drop(guard);
    shared.tracker.release(&entry);
}

fn announce_finished(shared: &Shared, job: Job) {
    match job.status {
        JobStatus::Completed => {
            tracing::info!(job = %job.id, "Completed {}", job.source.display());
            shared.emit(QueueEvent::JobCompleted(job));
        }
        JobStatus::Cancelled => {
            tracing::info!(job = %job.id, "Cancelled {}", job.source.display());
            shared.emit(QueueEvent::JobCancelled(job));
        }
        _ => {
            tracing::warn!(
                job = %job.id,
                "Failed {}: {}",
                job.source.display(),
                job.error.as_deref().unwrap_or_default()
            );
            shared.emit(QueueEvent::JobFailed(job));
        }
    }
}

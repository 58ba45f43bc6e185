//! Tracking of live jobs by identity and by source path.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use filecommander_core::{Job, JobId, JobStatus, OperationKind};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{ConflictReason, QueueError};

/// A job admitted to the queue, shared between the dispatch loop, its
/// execution unit and the public API.
#[derive(Debug)]
pub(crate) struct JobEntry {
    pub id: JobId,
    pub source: PathBuf,
    pub cancel: CancellationToken,
    job: Mutex<Job>,
}

impl JobEntry {
    fn new(job: Job) -> Self {
        Self {
            id: job.id,
            source: job.source.clone(),
            cancel: CancellationToken::new(),
            job: Mutex::new(job),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the job as it is now.
    pub fn snapshot(&self) -> Job {
        self.lock().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn set_progress(&self, percent: u8) {
        self.lock().set_progress(percent);
    }

    /// Apply a transition, returning the new snapshot if it was legal.
    pub fn transition(&self, next: JobStatus, error: Option<String>) -> Option<Job> {
        let mut job = self.lock();
        if !job.transition(next) {
            return None;
        }
        if error.is_some() {
            job.error = error;
        }
        Some(job.clone())
    }

    /// Cancel the job only if it has not started yet.
    pub fn cancel_if_queued(&self, reason: &str) -> Option<Job> {
        let mut job = self.lock();
        if job.status != JobStatus::Queued {
            return None;
        }
        job.transition(JobStatus::Cancelled);
        job.error = Some(reason.to_string());
        Some(job.clone())
    }

    /// Whether an incoming job on the same source collides with this one.
    fn conflicts_with(&self, incoming: &Job) -> Option<ConflictReason> {
        let existing = self.lock();
        if existing.status.is_terminal() || !incoming.operation.is_structural() {
            return None;
        }
        if existing.operation == OperationKind::Copy {
            return Some(ConflictReason::PendingCopy);
        }
        if existing.operation == incoming.operation && existing.destination == incoming.destination {
            return Some(ConflictReason::AlreadyQueued);
        }
        None
    }
}

/// The identity map and the source-path map, updated together.
///
/// Lock order is path map, then identity map, then a job's own mutex. Code
/// holding a job mutex never touches either map.
#[derive(Debug)]
pub(crate) struct JobTracker {
    by_id: DashMap<JobId, Arc<JobEntry>>,
    by_path: DashMap<PathBuf, Vec<Arc<JobEntry>>>,
    live: watch::Sender<usize>,
}

impl Default for JobTracker {
    fn default() -> Self {
        let (live, _) = watch::channel(0);
        Self {
            by_id: DashMap::new(),
            by_path: DashMap::new(),
            live,
        }
    }
}

impl JobTracker {
    /// Check the job against live jobs on its source and record it.
    ///
    /// The check and the insert happen under the same path-map shard lock,
    /// so two concurrent admissions on one path cannot both pass.
    pub fn admit(&self, job: Job) -> Result<Arc<JobEntry>, QueueError> {
        let mut slot = self.by_path.entry(job.source.clone()).or_default();

        if let Some(reason) = slot.iter().find_map(|e| e.conflicts_with(&job)) {
            return Err(QueueError::Conflict {
                path: job.source,
                reason,
            });
        }

        let entry = Arc::new(JobEntry::new(job));
        slot.push(Arc::clone(&entry));
        self.by_id.insert(entry.id, Arc::clone(&entry));
        drop(slot);

        self.live.send_modify(|n| *n += 1);
        Ok(entry)
    }

    /// Remove a job from both maps. Safe to call more than once.
    pub fn release(&self, entry: &JobEntry) {
        let now_empty = match self.by_path.get_mut(&entry.source) {
            Some(mut jobs) => {
                jobs.retain(|e| e.id != entry.id);
                jobs.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.by_path.remove_if(&entry.source, |_, v| v.is_empty());
        }

        if self.by_id.remove(&entry.id).is_some() {
            self.live.send_modify(|n| *n = n.saturating_sub(1));
        }
    }

    pub fn get(&self, id: JobId) -> Option<Arc<JobEntry>> {
        self.by_id.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Every tracked job, oldest first.
    pub fn entries(&self) -> Vec<Arc<JobEntry>> {
        let entries: Vec<_> = self.by_id.iter().map(|e| Arc::clone(e.value())).collect();
        let mut keyed: Vec<_> = entries
            .into_iter()
            .map(|e| {
                let queued_at = e.snapshot().queued_at;
                (queued_at, e)
            })
            .collect();
        keyed.sort_by_key(|(at, _)| *at);
        keyed.into_iter().map(|(_, e)| e).collect()
    }

    /// Snapshots of the live jobs whose source is `path`.
    pub fn jobs_for_path(&self, path: &Path) -> Vec<Job> {
        let entries: Vec<_> = match self.by_path.get(path) {
            Some(jobs) => jobs.iter().cloned().collect(),
            None => return Vec::new(),
        };
        entries
            .iter()
            .map(|e| e.snapshot())
            .filter(|j| !j.status.is_terminal())
            .collect()
    }

    pub fn len(&self) -> usize {
        *self.live.borrow()
    }

    /// Resolve once no job is tracked.
    pub async fn wait_idle(&self) {
        let mut rx = self.live.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_after_copy_is_rejected() {
        let tracker = JobTracker::default();
        tracker.admit(Job::copy("/data/a", "/backup/a")).unwrap();

        let err = tracker.admit(Job::move_to("/data/a", "/other/a")).unwrap_err();
        assert_eq!(
            err,
            QueueError::Conflict {
                path: PathBuf::from("/data/a"),
                reason: ConflictReason::PendingCopy
            }
        );
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.jobs_for_path(Path::new("/data/a")).len(), 1);
    }

    #[test]
    fn test_duplicate_delete_is_rejected() {
        let tracker = JobTracker::default();
        tracker.admit(Job::delete("/tmp/junk")).unwrap();

        let err = tracker.admit(Job::delete("/tmp/junk")).unwrap_err();
        assert!(matches!(
            err,
            QueueError::Conflict {
                reason: ConflictReason::AlreadyQueued,
                ..
            }
        ));
    }

    #[test]
    fn test_copies_never_conflict() {
        let tracker = JobTracker::default();
        tracker.admit(Job::copy("/a", "/b/a")).unwrap();
        tracker.admit(Job::copy("/a", "/b/a")).unwrap();
        tracker.admit(Job::move_to("/c", "/d/c")).unwrap();
        tracker.admit(Job::copy("/c", "/e/c")).unwrap();
        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn test_moves_to_different_destinations_are_allowed() {
        let tracker = JobTracker::default();
        tracker.admit(Job::move_to("/a", "/x/a")).unwrap();
        tracker.admit(Job::move_to("/a", "/y/a")).unwrap();
        assert_eq!(tracker.jobs_for_path(Path::new("/a")).len(), 2);
    }

    #[test]
    fn test_release_clears_path_entry() {
        let tracker = JobTracker::default();
        let entry = tracker.admit(Job::copy("/a", "/b")).unwrap();

        tracker.release(&entry);
        tracker.release(&entry);

        assert_eq!(tracker.len(), 0);
        assert!(tracker.jobs_for_path(Path::new("/a")).is_empty());
        assert!(tracker.by_path.get(Path::new("/a")).is_none());
        assert!(tracker.get(entry.id).is_none());
    }

    #[test]
    fn test_terminal_jobs_do_not_block_admission() {
        let tracker = JobTracker::default();
        let copy = tracker.admit(Job::copy("/a", "/b")).unwrap();
        copy.cancel_if_queued("cancelled").unwrap();

        assert!(tracker.admit(Job::delete("/a")).is_ok());
    }

    #[test]
    fn test_cancel_if_queued_ignores_running() {
        let tracker = JobTracker::default();
        let entry = tracker.admit(Job::copy("/a", "/b")).unwrap();
        entry.transition(JobStatus::Running, None).unwrap();

        assert!(entry.cancel_if_queued("nope").is_none());
        assert_eq!(entry.status(), JobStatus::Running);
    }
}

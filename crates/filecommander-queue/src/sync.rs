//! Feeding a directory comparison into the queue.

use std::path::{Path, PathBuf};

use filecommander_core::JobId;
use filecommander_diff::{DiffConfig, DiffType, DirectoryDiff, SyncDirection, plan_sync};

use crate::error::QueueError;
use crate::queue::TaskQueue;

/// What a sync submitted.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Jobs accepted by the queue.
    pub queued: Vec<JobId>,
    /// Sources whose copy the queue refused, with the reason.
    pub rejected: Vec<(PathBuf, QueueError)>,
    /// Entries left alone because they could not be resolved automatically.
    pub skipped_conflicts: usize,
    /// Comparison errors; when present nothing was queued.
    pub errors: Vec<String>,
}

/// Compare `left` and `right` recursively and queue the copies that
/// reconcile them.
pub async fn execute_sync(
    queue: &TaskQueue,
    left: &Path,
    right: &Path,
    direction: SyncDirection,
) -> Result<SyncReport, QueueError> {
    execute_sync_with(queue, left, right, direction, DiffConfig::default()).await
}

/// [`execute_sync`] with explicit comparison settings. Recursion is always on.
pub async fn execute_sync_with(
    queue: &TaskQueue,
    left: &Path,
    right: &Path,
    direction: SyncDirection,
    config: DiffConfig,
) -> Result<SyncReport, QueueError> {
    let config = DiffConfig {
        recursive: true,
        ..config
    };
    let (left, right) = (left.to_path_buf(), right.to_path_buf());

    let diff = {
        let (left, right) = (left.clone(), right.clone());
        tokio::task::spawn_blocking(move || DirectoryDiff::with_config(config).compare(&left, &right))
            .await
    };

    let mut report = SyncReport::default();
    let diff = match diff {
        Ok(diff) => diff,
        Err(e) => {
            report.errors.push(format!("Comparison task failed: {e}"));
            return Ok(report);
        }
    };

    report.errors = diff.entries.iter().filter_map(|e| e.error.clone()).collect();
    if !report.errors.is_empty() {
        return Ok(report);
    }
    report.skipped_conflicts = diff
        .entries
        .iter()
        .filter(|e| e.diff_type == DiffType::Conflict)
        .count();

    let jobs = plan_sync(&diff.entries, &left, &right, direction);
    tracing::info!(
        jobs = jobs.len(),
        conflicts = report.skipped_conflicts,
        "Syncing {} and {}",
        left.display(),
        right.display()
    );

    for job in jobs {
        let source = job.source.clone();
        match queue.enqueue(job) {
            Ok(id) => report.queued.push(id),
            Err(QueueError::ShutDown) => return Err(QueueError::ShutDown),
            Err(e) => {
                tracing::warn!("Skipped {}: {}", source.display(), e);
                report.rejected.push((source, e));
            }
        }
    }

    Ok(report)
}

//! Turning diff results into copy jobs.

use std::path::{Path, PathBuf};

use filecommander_core::Job;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{DiffResult, SyncAction};

/// Which way a sync may copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SyncDirection {
    /// Copy whichever side is newer or missing.
    #[default]
    Both,
    /// Only copy from left to right.
    LeftToRight,
    /// Only copy from right to left.
    RightToLeft,
}

impl SyncDirection {
    /// Whether `action` is permitted in this direction.
    pub fn allows(&self, action: SyncAction) -> bool {
        match (self, action) {
            (Self::Both, a) => a.is_copy(),
            (Self::LeftToRight, SyncAction::CopyLeftToRight) => true,
            (Self::RightToLeft, SyncAction::CopyRightToLeft) => true,
            _ => false,
        }
    }
}

/// Plan the copy jobs that bring two roots into agreement.
///
/// Only copy actions produce jobs; deletions and conflicts are left alone.
/// Directories present on both sides produce no job, and entries below a
/// directory that is itself being copied are covered by that copy.
pub fn plan_sync(
    results: &[DiffResult],
    left_root: &Path,
    right_root: &Path,
    direction: SyncDirection,
) -> Vec<Job> {
    let mut jobs = Vec::new();
    let mut copied_dirs: Vec<PathBuf> = Vec::new();

    for result in results {
        if result.is_error() || !direction.allows(result.action) {
            continue;
        }
        if result.is_dir && result.left.is_some() && result.right.is_some() {
            continue;
        }
        if copied_dirs.iter().any(|dir| result.relative_path.starts_with(dir)) {
            continue;
        }

        let Some(source) = result.copy_source() else {
            continue;
        };
        let target_root = match result.action {
            SyncAction::CopyLeftToRight => right_root,
            _ => left_root,
        };

        if result.is_dir {
            copied_dirs.push(result.relative_path.clone());
        }
        jobs.push(Job::copy(source, target_root.join(&result.relative_path)));
    }

    jobs
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::DateTime;
    use filecommander_core::OperationKind;

    use super::*;
    use crate::types::EntrySide;

    fn side(root: &str, rel: &str, secs: i64, is_dir: bool) -> EntrySide {
        EntrySide {
            size: if is_dir { 0 } else { 4 },
            modified: DateTime::from_timestamp(secs, 0).unwrap(),
            path: Path::new(root).join(rel),
            is_dir,
        }
    }

    fn left_only(rel: &str, is_dir: bool) -> DiffResult {
        DiffResult::classify(rel.into(), Some(side("/l", rel, 10, is_dir)), None, Duration::ZERO)
    }

    #[test]
    fn test_left_only_file_becomes_copy() {
        let jobs = plan_sync(&[left_only("a.txt", false)], Path::new("/l"), Path::new("/r"), SyncDirection::Both);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].operation, OperationKind::Copy);
        assert_eq!(jobs[0].source, Path::new("/l/a.txt"));
        assert_eq!(jobs[0].destination.as_deref(), Some(Path::new("/r/a.txt")));
    }

    #[test]
    fn test_children_of_copied_directory_are_skipped() {
        let results = vec![
            left_only("docs", true),
            left_only("docs/a.txt", false),
            left_only("docs/sub", true),
            left_only("docs/sub/b.txt", false),
            left_only("docsx.txt", false),
        ];
        let jobs = plan_sync(&results, Path::new("/l"), Path::new("/r"), SyncDirection::Both);

        let sources: Vec<_> = jobs.iter().map(|j| j.source.clone()).collect();
        assert_eq!(sources, vec![PathBuf::from("/l/docs"), PathBuf::from("/l/docsx.txt")]);
    }

    #[test]
    fn test_shared_directory_produces_no_job() {
        let dir = DiffResult::classify(
            "shared".into(),
            Some(side("/l", "shared", 50, true)),
            Some(side("/r", "shared", 10, true)),
            Duration::ZERO,
        );
        let file = left_only("shared/new.txt", false);
        let jobs = plan_sync(&[dir, file], Path::new("/l"), Path::new("/r"), SyncDirection::Both);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].destination.as_deref(), Some(Path::new("/r/shared/new.txt")));
    }

    #[test]
    fn test_direction_filters() {
        let right = DiffResult::classify("b.txt".into(), None, Some(side("/r", "b.txt", 10, false)), Duration::ZERO);
        let results = vec![left_only("a.txt", false), right];

        let ltr = plan_sync(&results, Path::new("/l"), Path::new("/r"), SyncDirection::LeftToRight);
        assert_eq!(ltr.len(), 1);
        assert_eq!(ltr[0].source, Path::new("/l/a.txt"));

        let rtl = plan_sync(&results, Path::new("/l"), Path::new("/r"), SyncDirection::RightToLeft);
        assert_eq!(rtl.len(), 1);
        assert_eq!(rtl[0].destination.as_deref(), Some(Path::new("/l/b.txt")));
    }

    #[test]
    fn test_deletes_and_conflicts_are_never_planned() {
        let mut delete = left_only("gone.txt", false);
        delete.action = SyncAction::DeleteLeft;
        let conflict = DiffResult::classify(
            "c.txt".into(),
            Some(side("/l", "c.txt", 10, false)),
            Some(EntrySide {
                size: 99,
                ..side("/r", "c.txt", 10, false)
            }),
            Duration::ZERO,
        );

        let jobs = plan_sync(
            &[delete, conflict, DiffResult::error("boom")],
            Path::new("/l"),
            Path::new("/r"),
            SyncDirection::Both,
        );
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("left-to-right".parse::<SyncDirection>().unwrap(), SyncDirection::LeftToRight);
        assert_eq!(SyncDirection::RightToLeft.to_string(), "right-to-left");
    }
}

//! Diff classification and result types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// How a relative path differs between the two compared trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum DiffType {
    /// Same size and same modification time.
    Identical,
    /// Present only under the left root.
    LeftOnly,
    /// Present only under the right root.
    RightOnly,
    /// Both present, left modified more recently.
    LeftNewer,
    /// Both present, right modified more recently.
    RightNewer,
    /// Same timestamp but different size, or a file facing a directory.
    Conflict,
}

impl DiffType {
    /// The action that reconciles this difference.
    ///
    /// Conflicts are never resolved automatically.
    pub fn recommended_action(&self) -> SyncAction {
        match self {
            Self::Identical => SyncAction::None,
            Self::LeftOnly | Self::LeftNewer => SyncAction::CopyLeftToRight,
            Self::RightOnly | Self::RightNewer => SyncAction::CopyRightToLeft,
            Self::Conflict => SyncAction::Skip,
        }
    }

    /// The classification seen from the other side.
    pub fn swapped(&self) -> Self {
        match self {
            Self::LeftOnly => Self::RightOnly,
            Self::RightOnly => Self::LeftOnly,
            Self::LeftNewer => Self::RightNewer,
            Self::RightNewer => Self::LeftNewer,
            other => *other,
        }
    }
}

/// An operation that reconciles one diff entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SyncAction {
    None,
    CopyLeftToRight,
    CopyRightToLeft,
    DeleteLeft,
    DeleteRight,
    Skip,
}

impl SyncAction {
    /// Whether this action copies something.
    pub fn is_copy(&self) -> bool {
        matches!(self, Self::CopyLeftToRight | Self::CopyRightToLeft)
    }
}

/// One side's view of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySide {
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Full path on this side.
    pub path: PathBuf,
    /// Whether this side is a directory.
    pub is_dir: bool,
}

/// The comparison of one relative path under both roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Path relative to both roots.
    pub relative_path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Left-side information, if present there.
    pub left: Option<EntrySide>,
    /// Right-side information, if present there.
    pub right: Option<EntrySide>,
    /// How the two sides differ.
    pub diff_type: DiffType,
    /// What a sync would do about it.
    pub action: SyncAction,
    /// Set only on the sentinel entry reporting a failed comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiffResult {
    /// Classify an entry from whichever sides exist.
    ///
    /// Modification times closer than `tolerance` count as equal.
    pub(crate) fn classify(
        relative_path: PathBuf,
        left: Option<EntrySide>,
        right: Option<EntrySide>,
        tolerance: Duration,
    ) -> Self {
        let diff_type = match (&left, &right) {
            (Some(l), Some(r)) => compare_sides(l, r, tolerance),
            (Some(_), None) => DiffType::LeftOnly,
            (None, _) => DiffType::RightOnly,
        };
        let is_dir = left
            .as_ref()
            .or(right.as_ref())
            .map(|s| s.is_dir)
            .unwrap_or(false);

        Self {
            relative_path,
            is_dir,
            left,
            right,
            diff_type,
            action: diff_type.recommended_action(),
            error: None,
        }
    }

    /// The sentinel entry for a comparison that could not be completed.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            relative_path: PathBuf::new(),
            is_dir: false,
            left: None,
            right: None,
            diff_type: DiffType::Conflict,
            action: SyncAction::Skip,
            error: Some(message.into()),
        }
    }

    /// Whether this is the error sentinel.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Full path of the side the recommended action copies from.
    pub fn copy_source(&self) -> Option<&Path> {
        match self.action {
            SyncAction::CopyLeftToRight => self.left.as_ref().map(|s| s.path.as_path()),
            SyncAction::CopyRightToLeft => self.right.as_ref().map(|s| s.path.as_path()),
            _ => None,
        }
    }

    /// The same entry with left and right exchanged.
    pub fn swapped(self) -> Self {
        let diff_type = self.diff_type.swapped();
        Self {
            left: self.right,
            right: self.left,
            diff_type,
            action: if self.error.is_some() {
                SyncAction::Skip
            } else {
                diff_type.recommended_action()
            },
            ..self
        }
    }
}

fn compare_sides(left: &EntrySide, right: &EntrySide, tolerance: Duration) -> DiffType {
    if left.is_dir != right.is_dir {
        return DiffType::Conflict;
    }

    let tolerance = TimeDelta::from_std(tolerance).unwrap_or(TimeDelta::MAX);
    let delta = left.modified - right.modified;
    let same_time = delta.abs() <= tolerance;

    if same_time {
        if left.size == right.size {
            DiffType::Identical
        } else {
            DiffType::Conflict
        }
    } else if delta > TimeDelta::zero() {
        DiffType::LeftNewer
    } else {
        DiffType::RightNewer
    }
}

/// The full result of comparing two roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    /// Left root as given.
    pub left_root: PathBuf,
    /// Right root as given.
    pub right_root: PathBuf,
    /// Entries ordered by relative path.
    pub entries: Vec<DiffResult>,
}

impl DiffReport {
    /// Count entries per classification.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for entry in &self.entries {
            if entry.is_error() {
                summary.errors += 1;
                continue;
            }
            match entry.diff_type {
                DiffType::Identical => summary.identical += 1,
                DiffType::LeftOnly => summary.left_only += 1,
                DiffType::RightOnly => summary.right_only += 1,
                DiffType::LeftNewer => summary.left_newer += 1,
                DiffType::RightNewer => summary.right_newer += 1,
                DiffType::Conflict => summary.conflicts += 1,
            }
        }
        summary
    }

    /// Whether every entry is identical.
    pub fn is_in_sync(&self) -> bool {
        self.entries
            .iter()
            .all(|e| !e.is_error() && e.diff_type == DiffType::Identical)
    }

    /// The report with the panes exchanged.
    pub fn swapped(self) -> Self {
        Self {
            left_root: self.right_root,
            right_root: self.left_root,
            entries: self.entries.into_iter().map(DiffResult::swapped).collect(),
        }
    }
}

/// Per-classification counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub identical: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub left_newer: usize,
    pub right_newer: usize,
    pub conflicts: usize,
    pub errors: usize,
}

impl DiffSummary {
    /// Entries a sync would act on.
    pub fn actionable(&self) -> usize {
        self.left_only + self.right_only + self.left_newer + self.right_newer
    }
}

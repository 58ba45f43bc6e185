//! Directory comparison built on jwalk.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use globset::GlobSet;
use itertools::{EitherOrBoth, Itertools};
use jwalk::{Parallelism, WalkDir};

use crate::config::DiffConfig;
use crate::error::DiffError;
use crate::types::{DiffReport, DiffResult, EntrySide};

/// Compare two roots with default settings.
///
/// Never fails: a comparison that cannot be completed yields a single
/// sentinel entry carrying the error text.
pub fn compare(left: impl AsRef<Path>, right: impl AsRef<Path>, recursive: bool) -> Vec<DiffResult> {
    let config = DiffConfig {
        recursive,
        ..DiffConfig::default()
    };
    DirectoryDiff::with_config(config)
        .compare(left.as_ref(), right.as_ref())
        .entries
}

/// Compares two directory trees by relative path, size and modification time.
#[derive(Debug, Clone, Default)]
pub struct DirectoryDiff {
    config: DiffConfig,
}

impl DirectoryDiff {
    /// Create a comparer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a comparer with the given settings.
    pub fn with_config(config: DiffConfig) -> Self {
        Self { config }
    }

    /// The settings in effect.
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Compare `left` against `right`.
    ///
    /// If either root is not an existing directory the result is empty.
    /// Entries are ordered by the plain string order of their relative path.
    pub fn compare(&self, left: &Path, right: &Path) -> DiffReport {
        let entries = match self.try_compare(left, right) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("Comparison of {} and {} failed: {}", left.display(), right.display(), err);
                vec![DiffResult::error(err.to_string())]
            }
        };

        DiffReport {
            left_root: left.to_path_buf(),
            right_root: right.to_path_buf(),
            entries,
        }
    }

    /// Compare, surfacing errors instead of folding them into a sentinel.
    pub fn try_compare(&self, left: &Path, right: &Path) -> Result<Vec<DiffResult>, DiffError> {
        let excludes = self.config.exclude_set()?;
        if !left.is_dir() || !right.is_dir() {
            tracing::debug!("Missing root, nothing to compare: {} / {}", left.display(), right.display());
            return Ok(Vec::new());
        }
        let left_map = self.collect(left, excludes.as_ref())?;
        let right_map = self.collect(right, excludes.as_ref())?;
        let tolerance = self.config.mtime_tolerance();

        tracing::debug!(
            left = left_map.len(),
            right = right_map.len(),
            "Comparing {} and {}",
            left.display(),
            right.display()
        );

        let results = left_map
            .into_iter()
            .merge_join_by(right_map, |(l, _), (r, _)| l.cmp(r))
            .map(|pair| match pair {
                EitherOrBoth::Both((rel, l), (_, r)) => DiffResult::classify(rel.into(), Some(l), Some(r), tolerance),
                EitherOrBoth::Left((rel, l)) => DiffResult::classify(rel.into(), Some(l), None, tolerance),
                EitherOrBoth::Right((rel, r)) => DiffResult::classify(rel.into(), None, Some(r), tolerance),
            })
            .collect();

        Ok(results)
    }

    /// Build the relative-path map for one root, keyed by the raw path string
    /// so iteration follows string order rather than component order.
    fn collect(
        &self,
        root: &Path,
        excludes: Option<&GlobSet>,
    ) -> Result<BTreeMap<OsString, EntrySide>, DiffError> {
        let mut map = BTreeMap::new();

        match fs::read_dir(root) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                tracing::debug!("Skipping unreadable root {}", root.display());
                return Ok(map);
            }
            Err(err) => return Err(DiffError::io(root, err)),
        }

        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            },
            1 => Parallelism::Serial,
            n => Parallelism::RayonNewPool(n),
        };

        let walker = WalkDir::new(root)
            .parallelism(parallelism)
            .skip_hidden(false)
            .follow_links(self.config.follow_symlinks)
            .min_depth(1)
            .max_depth(if self.config.recursive { usize::MAX } else { 1 });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                    if err.io_error().map(|e| e.kind()) == Some(ErrorKind::PermissionDenied) {
                        tracing::debug!("Skipping unreadable entry {}", path);
                    } else {
                        tracing::warn!("Skipping {}: {}", path, err);
                    }
                    continue;
                }
            };

            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if is_excluded(excludes, relative) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    tracing::debug!("Skipping {}: {}", path.display(), err);
                    continue;
                }
            };

            let is_dir = metadata.is_dir();
            let side = EntrySide {
                size: if is_dir { 0 } else { metadata.len() },
                modified: DateTime::<Utc>::from(metadata.modified().unwrap_or(std::time::UNIX_EPOCH)),
                path: path.clone(),
                is_dir,
            };
            map.insert(relative.as_os_str().to_os_string(), side);
        }

        Ok(map)
    }
}

/// Whether `relative` or any of its ancestors matches an exclude pattern.
fn is_excluded(excludes: Option<&GlobSet>, relative: &Path) -> bool {
    let Some(set) = excludes else {
        return false;
    };

    relative
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| set.is_match(p) || p.file_name().is_some_and(|name| set.is_match(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffConfig;

    #[test]
    fn test_is_excluded_covers_descendants() {
        let config = DiffConfig::builder()
            .exclude_patterns(vec!["node_modules".to_string(), "*.log".to_string()])
            .build()
            .unwrap();
        let set = config.exclude_set().unwrap();

        assert!(is_excluded(set.as_ref(), Path::new("node_modules")));
        assert!(is_excluded(set.as_ref(), Path::new("web/node_modules/pkg/index.js")));
        assert!(is_excluded(set.as_ref(), Path::new("logs/today.log")));
        assert!(!is_excluded(set.as_ref(), Path::new("src/main.rs")));
        assert!(!is_excluded(None, Path::new("anything")));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"a").unwrap();

        let diff = DirectoryDiff::new();
        let missing = Path::new("/definitely/not/here");
        assert!(diff.try_compare(temp.path(), missing).unwrap().is_empty());
        assert!(diff.try_compare(missing, temp.path()).unwrap().is_empty());
    }
}

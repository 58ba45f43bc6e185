//! Recursive delete with cancellation between entries.

use std::fs;
use std::path::Path;

use filecommander_core::OperationError;

use crate::executor::ExecContext;
use crate::progress::ProgressTracker;

/// Remove a file, a symlink, or a whole directory tree.
///
/// Symlinks are removed, never followed.
pub(crate) fn delete_path(
    ctx: &ExecContext,
    path: &Path,
    tracker: &mut ProgressTracker,
) -> Result<(), OperationError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| OperationError::io(path, e))?;

    if metadata.is_dir() {
        tracker.set_total(count_entries(path) + 1);
        remove_tree(ctx, path, tracker)
    } else {
        fs::remove_file(path).map_err(|e| OperationError::io(path, e))
    }
}

fn remove_tree(
    ctx: &ExecContext,
    dir: &Path,
    tracker: &mut ProgressTracker,
) -> Result<(), OperationError> {
    let entries = fs::read_dir(dir).map_err(|e| OperationError::io(dir, e))?;

    for entry in entries {
        ctx.check_cancelled()?;

        let entry = entry.map_err(|e| OperationError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| OperationError::io(&path, e))?;

        if file_type.is_dir() {
            remove_tree(ctx, &path, tracker)?;
        } else {
            fs::remove_file(&path).map_err(|e| OperationError::io(&path, e))?;
            tracker.advance(1);
        }
    }

    fs::remove_dir(dir).map_err(|e| OperationError::io(dir, e))?;
    tracker.advance(1);
    Ok(())
}

/// Number of entries (files and directories) below `dir`.
fn count_entries(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(ft) if ft.is_dir() => 1 + count_entries(&entry.path()),
            _ => 1,
        })
        .sum()
}

//! Rename-based move with a copy fallback across devices.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use filecommander_core::OperationError;

use crate::copy::{copy_path, is_nested};
use crate::executor::ExecContext;
use crate::progress::ProgressTracker;

/// Move `source` to `destination` without ever overwriting the destination.
pub(crate) fn move_path(
    ctx: &ExecContext,
    source: &Path,
    destination: &Path,
    tracker: &mut ProgressTracker,
) -> Result<(), OperationError> {
    let metadata = fs::symlink_metadata(source).map_err(|e| OperationError::io(source, e))?;

    if fs::symlink_metadata(destination).is_ok() {
        return Err(OperationError::AlreadyExists {
            path: destination.to_path_buf(),
        });
    }

    if metadata.is_dir() && is_nested(source, destination) {
        return Err(OperationError::SourceIsAncestor {
            path: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }

    ctx.check_cancelled()?;

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            tracing::debug!(
                source = %source.display(),
                destination = %destination.display(),
                "rename crosses devices, falling back to copy"
            );
            move_across_devices(ctx, source, destination, metadata.is_dir(), tracker)
        }
        // A missing destination parent also reports NotFound.
        Err(e) if e.kind() == ErrorKind::NotFound && fs::symlink_metadata(source).is_ok() => {
            Err(OperationError::other(destination, e.to_string()))
        }
        Err(e) => Err(OperationError::io(source, e)),
    }
}

/// Copy then remove the source. A partial destination is cleaned up on failure.
fn move_across_devices(
    ctx: &ExecContext,
    source: &Path,
    destination: &Path,
    is_dir: bool,
    tracker: &mut ProgressTracker,
) -> Result<(), OperationError> {
    if let Err(e) = copy_path(ctx, source, destination, tracker) {
        let _ = if is_dir {
            fs::remove_dir_all(destination)
        } else {
            fs::remove_file(destination)
        };
        return Err(e);
    }

    let removed = if is_dir {
        fs::remove_dir_all(source)
    } else {
        fs::remove_file(source)
    };
    removed.map_err(|e| OperationError::io(source, e))
}

//! Streaming copy of files and directory trees.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use filecommander_core::OperationError;

use crate::executor::ExecContext;
use crate::progress::ProgressTracker;

/// Copy a file or directory tree from `source` to `destination`.
///
/// Existing destination files are overwritten, unless the destination is the
/// source itself. Missing parent directories of the destination are created.
/// Symlinks inside a copied tree are recreated, never followed.
pub(crate) fn copy_path(
    ctx: &ExecContext,
    source: &Path,
    destination: &Path,
    tracker: &mut ProgressTracker,
) -> Result<u64, OperationError> {
    let metadata = fs::metadata(source).map_err(|e| OperationError::io(source, e))?;

    if is_nested(source, destination) || is_same_file(source, destination) {
        return Err(OperationError::SourceIsAncestor {
            path: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }

    if metadata.is_dir() {
        tracker.set_total(tree_size(source));
        copy_dir(ctx, source, destination, tracker)
    } else {
        tracker.set_total(metadata.len());
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
            }
        }
        copy_file(ctx, source, destination, tracker)
    }
}

/// Recursively copy a directory: files first, then sub-directories.
fn copy_dir(
    ctx: &ExecContext,
    source: &Path,
    destination: &Path,
    tracker: &mut ProgressTracker,
) -> Result<u64, OperationError> {
    fs::create_dir_all(destination).map_err(|e| write_error(destination, e))?;

    let mut entries: Vec<_> = fs::read_dir(source)
        .map_err(|e| OperationError::io(source, e))?
        .collect::<Result<_, _>>()
        .map_err(|e| OperationError::io(source, e))?;
    entries.sort_by_key(|e| e.file_name());

    let (dirs, files): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.file_type().is_ok_and(|t| t.is_dir()));

    let mut total_bytes = 0u64;

    for entry in files {
        ctx.check_cancelled()?;
        let dest_path = destination.join(entry.file_name());
        if entry.file_type().is_ok_and(|t| t.is_symlink()) {
            copy_symlink(&entry.path(), &dest_path)?;
        } else {
            total_bytes += copy_file(ctx, &entry.path(), &dest_path, tracker)?;
        }
    }

    for entry in dirs {
        ctx.check_cancelled()?;
        let dest_path = destination.join(entry.file_name());
        total_bytes += copy_dir(ctx, &entry.path(), &dest_path, tracker)?;
    }

    Ok(total_bytes)
}

/// Stream a single file through a fixed-size buffer.
///
/// A file cut short by cancellation is removed so no truncated copy is left
/// behind.
fn copy_file(
    ctx: &ExecContext,
    source: &Path,
    destination: &Path,
    tracker: &mut ProgressTracker,
) -> Result<u64, OperationError> {
    let mut reader = File::open(source).map_err(|e| OperationError::io(source, e))?;
    let metadata = reader.metadata().map_err(|e| OperationError::io(source, e))?;
    let mut writer = File::create(destination).map_err(|e| write_error(destination, e))?;

    let mut buffer = vec![0u8; ctx.options.buffer_size];
    let mut copied = 0u64;

    loop {
        if ctx.cancel.is_cancelled() {
            drop(writer);
            let _ = fs::remove_file(destination);
            return Err(OperationError::Cancelled);
        }

        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(OperationError::io(source, e)),
        };

        writer
            .write_all(&buffer[..read])
            .map_err(|e| write_error(destination, e))?;
        copied += read as u64;
        tracker.advance(read as u64);
    }

    writer.flush().map_err(|e| write_error(destination, e))?;

    if ctx.options.preserve_timestamps {
        if let Ok(modified) = metadata.modified() {
            if let Err(e) = writer.set_modified(modified) {
                tracing::debug!(path = %destination.display(), "could not preserve mtime: {e}");
            }
        }
    }

    Ok(copied)
}

/// Recreate a symlink pointing at the same target.
#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> Result<(), OperationError> {
    let target = fs::read_link(source).map_err(|e| OperationError::io(source, e))?;
    if fs::symlink_metadata(destination).is_ok() {
        fs::remove_file(destination).map_err(|e| write_error(destination, e))?;
    }
    std::os::unix::fs::symlink(&target, destination).map_err(|e| write_error(destination, e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, _destination: &Path) -> Result<(), OperationError> {
    tracing::debug!(path = %source.display(), "skipping symlink");
    Ok(())
}

/// Errors on the destination side are always I/O failures, never "not found".
fn write_error(path: &Path, error: std::io::Error) -> OperationError {
    OperationError::other(path, error.to_string())
}

/// Whether `destination` lies inside `source`.
pub(crate) fn is_nested(source: &Path, destination: &Path) -> bool {
    let source = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
    let destination =
        std::path::absolute(destination).unwrap_or_else(|_| destination.to_path_buf());
    destination.starts_with(&source)
}

/// Whether both paths name the same existing file.
#[cfg(unix)]
fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Total size of all regular files below a directory, not following symlinks.
fn tree_size(dir: &Path) -> u64 {
    let mut bytes = 0u64;

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                bytes += tree_size(&entry.path());
            } else if file_type.is_file() {
                if let Ok(metadata) = entry.metadata() {
                    bytes += metadata.len();
                }
            }
        }
    }

    bytes
}

//! Directory comparison and sync planning for filecommander.
//!
//! [`DirectoryDiff`] walks two roots, pairs entries by relative path and
//! classifies each pair by size and modification time. [`plan_sync`] turns
//! the copy-worthy entries into [`Job`](filecommander_core::Job)s for the
//! task queue. Nothing here touches the queue or modifies the filesystem.

mod config;
mod engine;
mod error;
mod sync;
mod types;

pub use config::{DiffConfig, DiffConfigBuilder};
pub use engine::{DirectoryDiff, compare};
pub use error::DiffError;
pub use sync::{SyncDirection, plan_sync};
pub use types::{DiffReport, DiffResult, DiffSummary, DiffType, EntrySide, SyncAction};

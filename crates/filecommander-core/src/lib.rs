//! Core types for filecommander.
//!
//! This crate provides the data model shared by the executor, the task
//! queue and the diff engine: jobs and their lifecycle, drive-pair keys,
//! the operation error taxonomy and queue configuration.

mod config;
mod drive;
mod error;
mod job;

pub use config::{
    QueueConfig, QueueConfigBuilder, DEFAULT_COPY_BUFFER_SIZE, MIN_COPY_BUFFER_SIZE,
};
pub use drive::{DriveKeyMode, DrivePairKey, DriveResolver, LexicalRoots, MountRoots, UNKNOWN_ROOT};
pub use error::OperationError;
pub use job::{Job, JobId, JobStatus, OperationKind};

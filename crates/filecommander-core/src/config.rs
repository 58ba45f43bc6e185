//! Queue configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::drive::DriveKeyMode;

/// Smallest buffer the copy loop may use.
pub const MIN_COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Default copy buffer (80 KiB).
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 80 * 1024;

/// Configuration for the file operation queue and its executor.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct QueueConfig {
    /// Start dispatching as soon as jobs arrive. When false the queue starts paused.
    #[builder(default = "true")]
    pub auto_start: bool,

    /// Size of the buffer used when streaming file contents.
    #[builder(default = "DEFAULT_COPY_BUFFER_SIZE")]
    pub copy_buffer_size: usize,

    /// Give copied files the source's modification time.
    #[builder(default = "true")]
    pub preserve_timestamps: bool,

    /// Capacity of the event broadcast channel.
    #[builder(default = "1024")]
    pub event_capacity: usize,

    /// How storage roots are derived for drive-pair serialization.
    #[builder(default)]
    pub drive_keys: DriveKeyMode,
}

impl QueueConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(size) = self.copy_buffer_size {
            if size < MIN_COPY_BUFFER_SIZE {
                return Err(format!(
                    "Copy buffer must be at least {MIN_COPY_BUFFER_SIZE} bytes, got {size}"
                ));
            }
        }
        if self.event_capacity == Some(0) {
            return Err("Event capacity must be positive".to_string());
        }
        Ok(())
    }
}

impl QueueConfig {
    /// Create a new queue config builder.
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Buffer size clamped to the supported minimum.
    pub fn effective_buffer_size(&self) -> usize {
        self.copy_buffer_size.max(MIN_COPY_BUFFER_SIZE)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            preserve_timestamps: true,
            event_capacity: 1024,
            drive_keys: DriveKeyMode::default(),
        }
    }
}

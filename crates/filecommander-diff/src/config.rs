//! Comparison configuration.

use std::time::Duration;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::DiffError;

/// Configuration for a directory comparison.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq, Eq)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct DiffConfig {
    /// Descend into subdirectories.
    #[builder(default = "true")]
    pub recursive: bool,

    /// Modification times at most this many milliseconds apart compare equal.
    ///
    /// Zero means exact comparison. FAT volumes need about 2000.
    #[builder(default = "0")]
    pub mtime_tolerance_ms: u64,

    /// Glob patterns for entries left out of the comparison.
    ///
    /// Patterns match the relative path and the bare file name. An excluded
    /// directory excludes everything below it.
    #[builder(default)]
    pub exclude_patterns: Vec<String>,

    /// Follow symbolic links while walking.
    #[builder(default = "false")]
    pub follow_symlinks: bool,

    /// Number of walker threads (0 = auto-detect, 1 = walk serially).
    #[builder(default = "0")]
    pub threads: usize,
}

impl DiffConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref patterns) = self.exclude_patterns {
            for pattern in patterns {
                Glob::new(pattern).map_err(|e| format!("Invalid exclude pattern '{pattern}': {e}"))?;
            }
        }
        Ok(())
    }
}

impl DiffConfig {
    /// Create a new diff config builder.
    pub fn builder() -> DiffConfigBuilder {
        DiffConfigBuilder::default()
    }

    /// The configured timestamp tolerance.
    pub fn mtime_tolerance(&self) -> Duration {
        Duration::from_millis(self.mtime_tolerance_ms)
    }

    /// Compile the exclude patterns, `None` when there are none.
    pub(crate) fn exclude_set(&self) -> Result<Option<GlobSet>, DiffError> {
        if self.exclude_patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| DiffError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }

        builder.build().map(Some).map_err(|e| DiffError::InvalidPattern {
            pattern: self.exclude_patterns.join(", "),
            message: e.to_string(),
        })
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            mtime_tolerance_ms: 0,
            exclude_patterns: Vec::new(),
            follow_symlinks: false,
            threads: 0,
        }
    }
}

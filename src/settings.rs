//! Persistent CLI settings.

use std::path::{Path, PathBuf};

use filecommander_core::QueueConfig;
use filecommander_diff::DiffConfig;
use serde::{Deserialize, Serialize};

/// Settings loaded from `settings.toml` in the user's config directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Task queue and executor settings.
    pub queue: QueueConfig,
    /// Directory comparison settings.
    pub diff: DiffConfig,
}

impl Settings {
    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("filecommander").join("settings.toml"))
    }

    /// Load settings from disk, or return defaults.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from `path`, falling back to defaults if it is missing
    /// or malformed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring malformed settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings to the default location.
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "No config directory")
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml()?)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> std::io::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use filecommander_core::DriveKeyMode;

    use super::*;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.queue.auto_start = false;
        settings.queue.drive_keys = DriveKeyMode::Lexical;
        settings.diff.mtime_tolerance_ms = 2000;
        settings.diff.exclude_patterns = vec!["*.tmp".to_string()];
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert!(!loaded.queue.auto_start);
        assert_eq!(loaded.queue.drive_keys, DriveKeyMode::Lexical);
        assert_eq!(loaded.diff, settings.diff);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[diff]\nrecursive = false\n").unwrap();

        let loaded = Settings::load_from(&path);
        assert!(!loaded.diff.recursive);
        assert!(loaded.queue.auto_start);
        assert!(loaded.queue.preserve_timestamps);
    }

    #[test]
    fn test_missing_or_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from(&dir.path().join("absent.toml")).queue.auto_start);

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "queue = [not toml").unwrap();
        assert!(Settings::load_from(&path).diff.recursive);
    }
}

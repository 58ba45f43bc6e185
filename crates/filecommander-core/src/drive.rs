//! Storage-root resolution and drive-pair keys.
//!
//! Jobs whose source and destination live on the same pair of storage roots
//! contend for the same disks, so the queue runs them one at a time. The key
//! is derived lazily from whatever roots are observed; devices are never
//! enumerated up front.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Placeholder used when a side of the pair has no resolvable root.
pub const UNKNOWN_ROOT: &str = "unknown";

/// Identifies the pair of storage roots a job reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DrivePairKey(String);

impl DrivePairKey {
    /// Build a key from the source and destination roots.
    pub fn new(source_root: Option<&Path>, dest_root: Option<&Path>) -> Self {
        let render = |root: Option<&Path>| {
            root.map(|r| r.display().to_string())
                .unwrap_or_else(|| UNKNOWN_ROOT.to_string())
        };
        Self(format!("{}:{}", render(source_root), render(dest_root)))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DrivePairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps a path to the storage root it lives on.
pub trait DriveResolver: Send + Sync + fmt::Debug {
    /// Return the root (mount point, drive letter) for `path`, if any.
    fn root_of(&self, path: &Path) -> Option<PathBuf>;
}

/// How the queue derives storage roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriveKeyMode {
    /// Walk up to the mount point of the path (Unix); drive prefix elsewhere.
    #[default]
    MountPoint,
    /// Use only the path's prefix and root directory, without touching the disk.
    Lexical,
}

impl DriveKeyMode {
    /// Create the resolver for this mode.
    pub fn resolver(&self) -> Box<dyn DriveResolver> {
        match self {
            Self::MountPoint => Box::new(MountRoots),
            Self::Lexical => Box::new(LexicalRoots),
        }
    }
}

/// Resolves roots purely from path syntax: `C:\` on Windows, `/` on Unix.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRoots;

impl DriveResolver for LexicalRoots {
    fn root_of(&self, path: &Path) -> Option<PathBuf> {
        if path.as_os_str().is_empty() {
            return None;
        }
        let absolute = std::path::absolute(path).ok()?;
        let root: PathBuf = absolute
            .components()
            .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
            .collect();
        (!root.as_os_str().is_empty()).then_some(root)
    }
}

/// Resolves roots to the mount point containing the path.
///
/// Paths that do not exist yet (typical for destinations) resolve through
/// their nearest existing ancestor.
#[derive(Debug, Clone, Copy, Default)]
pub struct MountRoots;

impl DriveResolver for MountRoots {
    #[cfg(unix)]
    fn root_of(&self, path: &Path) -> Option<PathBuf> {
        use std::os::unix::fs::MetadataExt;

        if path.as_os_str().is_empty() {
            return None;
        }
        let absolute = std::path::absolute(path).ok()?;
        let (mut mount, device) = absolute
            .ancestors()
            .find_map(|p| std::fs::metadata(p).ok().map(|m| (p, m.dev())))?;

        for ancestor in mount.ancestors().skip(1) {
            match std::fs::metadata(ancestor) {
                Ok(m) if m.dev() == device => mount = ancestor,
                _ => break,
            }
        }

        Some(mount.to_path_buf())
    }

    #[cfg(not(unix))]
    fn root_of(&self, path: &Path) -> Option<PathBuf> {
        LexicalRoots.root_of(path)
    }
}

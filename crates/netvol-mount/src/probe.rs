//! Observing mount state from the OS.
//!
//! Nothing here is cached: every call asks the filesystem again, since mounts
//! change out-of-band (another process, a reboot, someone running `umount`).

use std::path::Path;

/// Answers "does this root exist" and "is it a mount point".
pub trait MountProbe: Send + Sync {
    /// Whether `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is currently a mount point.
    fn is_mount(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl MountProbe for SystemProbe {
    fn exists(&self, path: &Path) -> bool {
        path.try_exists().unwrap_or(false)
    }

    fn is_mount(&self, path: &Path) -> bool {
        is_mount_point(path)
    }
}

/// A path is a mount point when it sits on a different device than its
/// parent, or is the same inode as its parent (the filesystem root).
/// Symlinks are never mount points.
#[cfg(unix)]
pub fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return false;
    };
    if meta.file_type().is_symlink() {
        return false;
    }
    let Ok(parent) = std::fs::symlink_metadata(path.join("..")) else {
        return false;
    };

    meta.dev() != parent.dev() || meta.ino() == parent.ino()
}

/// Without device ids, fall back to the mount table, and treat an existing
/// drive root as mounted.
#[cfg(not(unix))]
pub fn is_mount_point(path: &Path) -> bool {
    use std::path::Component;

    let mut components = path.components();
    if let (Some(Component::Prefix(_)), Some(Component::RootDir) | None, None) =
        (components.next(), components.next(), components.next())
    {
        return path.try_exists().unwrap_or(false);
    }

    crate::mount_table::system_mounts()
        .map(|mounts| mounts.iter().any(|m| m.mountpoint == path))
        .unwrap_or(false)
}

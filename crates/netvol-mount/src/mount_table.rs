//! Reading the OS mount table.
//!
//! Used to show which network filesystems are attached on this host and as
//! a fallback mount-point check on platforms without device ids.
//!
//! # Platform Differences
//!
//! - **macOS**: Parse `mount` command output
//! - **Linux**: Parse `/proc/mounts`
//! - **Other**: Empty table

use std::path::PathBuf;

use anyhow::Result;
#[cfg(any(target_os = "macos", target_os = "linux"))]
use anyhow::Context;
use serde::Serialize;

/// One row of the system mount table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemMount {
    /// The mount point path (e.g., `/home/alice/Volumes/Share`)
    pub mountpoint: PathBuf,
    /// The filesystem type (e.g., `cifs`, `smbfs`, `nfs4`)
    pub fstype: String,
    /// The source / device (e.g., `//files.example.org/Share`)
    pub fsname: String,
}

/// Filesystem types that indicate a network share.
const NETWORK_FSTYPES: &[&str] = &["smbfs", "cifs", "smb3", "nfs", "nfs4", "afpfs", "webdav"];

/// Check if a filesystem type is a network filesystem.
pub fn is_network_fstype(fstype: &str) -> bool {
    let fstype_lower = fstype.to_lowercase();
    NETWORK_FSTYPES.iter().any(|ft| fstype_lower == *ft)
}

/// Get all system mounts.
pub fn system_mounts() -> Result<Vec<SystemMount>> {
    #[cfg(target_os = "macos")]
    {
        system_mounts_macos()
    }

    #[cfg(target_os = "linux")]
    {
        system_mounts_linux()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Ok(Vec::new())
    }
}

/// Mounts whose filesystem type is a network filesystem.
pub fn network_mounts() -> Result<Vec<SystemMount>> {
    Ok(system_mounts()?
        .into_iter()
        .filter(|m| is_network_fstype(&m.fstype))
        .collect())
}

// ============================================================================
// Platform-specific implementations
// ============================================================================

/// Timeout for the `mount` listing.
/// A hung SMB server can make the listing block; keep it short.
#[cfg(target_os = "macos")]
const MOUNT_COMMAND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Parse macOS mount output.
///
/// Format: `{fsname} on {mountpoint} ({fstype}, {options...})`
/// Example: `//alice@files.example.org/Share on /Volumes/Share (smbfs, nodev, nosuid)`
#[cfg(target_os = "macos")]
fn system_mounts_macos() -> Result<Vec<SystemMount>> {
    use std::sync::mpsc;

    let child = std::process::Command::new("mount")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .context("Failed to spawn mount command")?;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });

    match rx.recv_timeout(MOUNT_COMMAND_TIMEOUT) {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(stdout.lines().filter_map(parse_macos_mount_line).collect())
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("Mount command failed: {e}")),
        Err(_) => {
            tracing::warn!(
                "Mount listing timed out after {:?}; returning empty mount list",
                MOUNT_COMMAND_TIMEOUT
            );
            Ok(Vec::new())
        }
    }
}

#[cfg(target_os = "macos")]
fn parse_macos_mount_line(line: &str) -> Option<SystemMount> {
    let on_idx = line.find(" on ")?;
    let fsname = line[..on_idx].to_string();

    let rest = &line[on_idx + 4..];
    let paren_idx = rest.rfind(" (")?;
    let mountpoint = PathBuf::from(&rest[..paren_idx]);

    let opts = rest[paren_idx + 2..].trim_end_matches(')');
    let fstype = opts.split(',').next()?.trim().to_string();

    Some(SystemMount {
        mountpoint,
        fstype,
        fsname,
    })
}

/// Parse Linux /proc/mounts.
///
/// Format: `{device} {mountpoint} {fstype} {options} {dump} {pass}`
#[cfg(target_os = "linux")]
fn system_mounts_linux() -> Result<Vec<SystemMount>> {
    let contents =
        std::fs::read_to_string("/proc/mounts").context("Failed to read /proc/mounts")?;
    Ok(contents.lines().filter_map(parse_linux_mount_line).collect())
}

#[cfg(target_os = "linux")]
fn parse_linux_mount_line(line: &str) -> Option<SystemMount> {
    let mut parts = line.split_whitespace();
    let fsname = parts.next()?;
    let mountpoint = parts.next()?;
    let fstype = parts.next()?;

    Some(SystemMount {
        mountpoint: PathBuf::from(unescape_mount_path(mountpoint)),
        fstype: fstype.to_string(),
        fsname: unescape_mount_path(fsname),
    })
}

/// Undo the octal escapes /proc/mounts uses for whitespace and backslashes
/// (`\040` space, `\011` tab, `\012` newline, `\134` backslash).
#[cfg(target_os = "linux")]
fn unescape_mount_path(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
            && let Ok(code) = u8::from_str_radix(&s[i + 1..=i + 3], 8)
        {
            out.push(code);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_network_fstype() {
        assert!(is_network_fstype("cifs"));
        assert!(is_network_fstype("smbfs"));
        assert!(is_network_fstype("NFS4"));
        assert!(!is_network_fstype("ext4"));
        assert!(!is_network_fstype("fuse.sshfs"));
    }

    #[test]
    fn test_system_mounts_does_not_fail() {
        assert!(system_mounts().is_ok());
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_parse_macos_mount_line() {
        let line = "//alice@files.example.org/Share on /Volumes/My Share (smbfs, nodev, nosuid, mounted by alice)";
        let mount = parse_macos_mount_line(line).unwrap();

        assert_eq!(mount.fsname, "//alice@files.example.org/Share");
        assert_eq!(mount.mountpoint, PathBuf::from("/Volumes/My Share"));
        assert_eq!(mount.fstype, "smbfs");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parse_linux_mount_line() {
        let line = "//files.example.org/Share /home/alice/Volumes/Share cifs rw,relatime 0 0";
        let mount = parse_linux_mount_line(line).unwrap();

        assert_eq!(mount.fsname, "//files.example.org/Share");
        assert_eq!(mount.mountpoint, PathBuf::from("/home/alice/Volumes/Share"));
        assert_eq!(mount.fstype, "cifs");
        assert!(parse_linux_mount_line("short line").is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unescape_mount_path() {
        assert_eq!(unescape_mount_path("/mnt/my\\040share"), "/mnt/my share");
        assert_eq!(unescape_mount_path("/mnt/a\\040b\\040c"), "/mnt/a b c");
        assert_eq!(unescape_mount_path("/mnt/share"), "/mnt/share");
        assert_eq!(unescape_mount_path("/mnt/trailing\\04"), "/mnt/trailing\\04");
    }
}

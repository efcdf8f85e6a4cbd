//! Platform-specific command construction.
//!
//! A [`MountStrategy`] turns a [`VolumeSpec`] into the argument vectors used
//! to attach and detach the volume, and says how readiness is verified. It
//! never spawns anything; [`MountController`](crate::MountController) owns
//! the side effects.
//!
//! # Command shapes
//!
//! | Strategy     | Mount                                              | Unmount                          |
//! |--------------|----------------------------------------------------|----------------------------------|
//! | POSIX        | `mount -t <mode> //<user>:<secret>@<address> <path>` | `umount <path>`                |
//! | Drive letter | `net use <D:> <address> /u:<user> <secret>`        | `net use <D:> <address> /delete` |

use std::fmt;
use std::path::PathBuf;

use crate::error::SpecError;
use crate::volume::{Platform, VolumeSpec};

/// An external command as an argument vector (never a shell string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Command running `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector including the program name.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Render for logs with every occurrence of `secret` masked.
    pub fn redacted(&self, secret: &str) -> String {
        let joined = self.argv().join(" ");
        if secret.is_empty() {
            joined
        } else {
            joined.replace(secret, "***")
        }
    }
}

/// How a strategy proves the volume is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The path must be a mount point
    MountPoint(PathBuf),
    /// The path must exist
    Exists(PathBuf),
}

/// Builds mount/unmount/verification commands for one platform.
pub trait MountStrategy: fmt::Debug + Send + Sync {
    /// Which platform variant this is.
    fn platform(&self) -> Platform;

    /// Local root the volume appears under.
    fn root(&self, spec: &VolumeSpec) -> PathBuf;

    /// Command attaching the volume.
    fn mount_command(&self, spec: &VolumeSpec) -> CommandLine;

    /// Command detaching the volume.
    fn unmount_command(&self, spec: &VolumeSpec) -> CommandLine;

    /// Check that proves the volume is attached.
    fn verification(&self, spec: &VolumeSpec) -> Verification;

    /// Whether the root is a directory this strategy creates and removes.
    fn manages_mount_point(&self) -> bool;
}

/// `mount -t` onto a local directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixStrategy;

impl MountStrategy for PosixStrategy {
    fn platform(&self) -> Platform {
        Platform::Posix
    }

    fn root(&self, spec: &VolumeSpec) -> PathBuf {
        spec.mount_point().to_path_buf()
    }

    fn mount_command(&self, spec: &VolumeSpec) -> CommandLine {
        CommandLine::new("mount")
            .arg("-t")
            .arg(spec.mode())
            .arg(format!(
                "//{}:{}@{}",
                spec.principal(),
                spec.secret(),
                spec.address()
            ))
            .arg(spec.mount_point().to_string_lossy())
    }

    fn unmount_command(&self, spec: &VolumeSpec) -> CommandLine {
        CommandLine::new("umount").arg(spec.mount_point().to_string_lossy())
    }

    fn verification(&self, spec: &VolumeSpec) -> Verification {
        Verification::MountPoint(self.root(spec))
    }

    fn manages_mount_point(&self) -> bool {
        true
    }
}

/// `net use` onto a drive letter.
#[derive(Debug, Clone, Copy)]
pub struct DriveLetterStrategy {
    drive: char,
}

impl DriveLetterStrategy {
    /// Strategy mapping onto `drive`.
    pub fn new(drive: char) -> Self {
        Self {
            drive: drive.to_ascii_uppercase(),
        }
    }

    /// Device name as `net use` expects it, e.g. `J:`.
    pub fn device(&self) -> String {
        format!("{}:", self.drive)
    }
}

impl MountStrategy for DriveLetterStrategy {
    fn platform(&self) -> Platform {
        Platform::DriveLetter
    }

    fn root(&self, _spec: &VolumeSpec) -> PathBuf {
        PathBuf::from(format!("{}:/", self.drive))
    }

    fn mount_command(&self, spec: &VolumeSpec) -> CommandLine {
        CommandLine::new("net")
            .arg("use")
            .arg(self.device())
            .arg(spec.address())
            .arg(format!("/u:{}", spec.principal()))
            .arg(spec.secret())
    }

    fn unmount_command(&self, spec: &VolumeSpec) -> CommandLine {
        CommandLine::new("net")
            .arg("use")
            .arg(self.device())
            .arg(spec.address())
            .arg("/delete")
    }

    fn verification(&self, spec: &VolumeSpec) -> Verification {
        Verification::Exists(self.root(spec))
    }

    fn manages_mount_point(&self) -> bool {
        false
    }
}

/// Pick the strategy for `platform`.
///
/// The drive-letter strategy needs a drive in the spec.
pub fn strategy_for(
    platform: Platform,
    spec: &VolumeSpec,
) -> Result<Box<dyn MountStrategy>, SpecError> {
    match platform {
        Platform::Posix => Ok(Box::new(PosixStrategy)),
        Platform::DriveLetter => {
            let drive = spec.drive().ok_or_else(|| SpecError::MissingDrive {
                address: spec.address().to_string(),
            })?;
            Ok(Box::new(DriveLetterStrategy::new(drive)))
        }
    }
}

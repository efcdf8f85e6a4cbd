//! Error taxonomy for network volume operations.
//!
//! Every failure surfaced by this crate is a [`VolumeError`]. Expected
//! conditions (the mount point is already there, the volume is not mounted,
//! ...) are distinguishable through [`VolumeError::kind`], while I/O faults
//! and unspawnable programs are reported on the fatal channel
//! ([`VolumeError::is_fatal`]).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result of running an external command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    /// Exit code, `None` if the process was terminated by a signal
    pub status: Option<i32>,
    /// Captured standard output, trimmed
    pub stdout: String,
    /// Captured standard error, trimmed
    pub stderr: String,
}

impl CommandOutcome {
    /// Outcome of a command that exited with `code` and printed nothing.
    pub fn exited(code: i32) -> Self {
        Self {
            status: Some(code),
            ..Self::default()
        }
    }

    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "exit status {code}")?,
            None => write!(f, "terminated by signal")?,
        }
        if !self.stderr.is_empty() {
            write!(f, ": {}", self.stderr)?;
        } else if !self.stdout.is_empty() {
            write!(f, ": {}", self.stdout)?;
        }
        Ok(())
    }
}

/// Errors raised by mount, unmount and lock-marker operations.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// `mount()` found the local root or drive letter already present
    #[error("Mount point {} already exists", .0.display())]
    MountPointAlreadyExists(PathBuf),

    /// The mount command ran but the volume never became ready
    #[error("Mounting {} failed ({outcome})", root.display())]
    MountFailed {
        /// Root that was expected to become a mount point
        root: PathBuf,
        /// What the mount command reported
        outcome: CommandOutcome,
    },

    /// `unmount()` found the root but nothing is mounted on it
    #[error("{address} is not mounted at {}", root.display())]
    VolumeNotMounted {
        /// Remote address of the volume
        address: String,
        /// Local root that was checked
        root: PathBuf,
    },

    /// `unmount()` found no root at all
    #[error("Mount point {} does not exist", .0.display())]
    MountPointMissing(PathBuf),

    /// The unmount command ran but the root is still a mount point
    #[error("Unmounting {} failed ({outcome})", root.display())]
    UnmountFailed {
        /// Root that is still mounted
        root: PathBuf,
        /// What the unmount command reported
        outcome: CommandOutcome,
    },

    /// An external program could not be started
    #[error("Failed to run {program}: {source}")]
    Command {
        /// Program name
        program: String,
        /// Underlying spawn error
        #[source]
        source: io::Error,
    },

    /// Filesystem fault while touching the mount point or lock markers
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Discriminant of [`VolumeError`] for branching without matching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeErrorKind {
    /// See [`VolumeError::MountPointAlreadyExists`]
    MountPointAlreadyExists,
    /// See [`VolumeError::MountFailed`]
    MountFailed,
    /// See [`VolumeError::VolumeNotMounted`]
    VolumeNotMounted,
    /// See [`VolumeError::MountPointMissing`]
    MountPointMissing,
    /// See [`VolumeError::UnmountFailed`]
    UnmountFailed,
    /// See [`VolumeError::Command`]
    Command,
    /// See [`VolumeError::Io`]
    Io,
}

impl VolumeError {
    /// Build an [`VolumeError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> VolumeErrorKind {
        match self {
            Self::MountPointAlreadyExists(_) => VolumeErrorKind::MountPointAlreadyExists,
            Self::MountFailed { .. } => VolumeErrorKind::MountFailed,
            Self::VolumeNotMounted { .. } => VolumeErrorKind::VolumeNotMounted,
            Self::MountPointMissing(_) => VolumeErrorKind::MountPointMissing,
            Self::UnmountFailed { .. } => VolumeErrorKind::UnmountFailed,
            Self::Command { .. } => VolumeErrorKind::Command,
            Self::Io { .. } => VolumeErrorKind::Io,
        }
    }

    /// Whether this is a hard fault rather than an expected volume condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), VolumeErrorKind::Command | VolumeErrorKind::Io)
    }
}

/// Errors raised while building a [`VolumeSpec`](crate::VolumeSpec) or
/// selecting its strategy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// Remote address is empty
    #[error("Volume address cannot be empty")]
    EmptyAddress,

    /// Drive identifier is not a single ASCII letter
    #[error("Invalid drive letter {0:?} (expected a single letter such as \"J\" or \"J:\")")]
    InvalidDrive(String),

    /// Drive-letter strategy selected but no drive configured
    #[error("No drive letter configured for {address}; drive mapping requires one")]
    MissingDrive {
        /// Remote address of the volume
        address: String,
    },
}

/// Result alias for volume operations.
pub type Result<T, E = VolumeError> = std::result::Result<T, E>;

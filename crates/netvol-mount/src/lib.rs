//! Network volume lifecycle for SMB shares.
//!
//! This crate attaches a remote share at a local root, waits until the OS
//! reports it ready, lets several processes share the mounted volume, and
//! detaches it once the last one is done.
//!
//! # Components
//!
//! ## Mounting
//!
//! - [`VolumeSpec`] - Address, local mount point or drive letter, credentials, mode, timeout
//! - [`MountStrategy`] - Builds mount/unmount commands; [`PosixStrategy`] or [`DriveLetterStrategy`]
//! - [`MountController`] - Drives one volume between [`MountState::Unmounted`] and [`MountState::Mounted`]
//! - [`VolumeError`] - Error type for mount operations
//!
//! ## Sharing
//!
//! - [`LockCoordinator`] - Hands out [`VolumeLease`]s backed by `.<holder>.lock` markers
//! - [`list_markers`] - Inspect who holds a mounted volume
//!
//! ## Seams
//!
//! - [`CommandRunner`] / [`SystemRunner`] - Process execution
//! - [`MountProbe`] / [`SystemProbe`] - Existence and mount-point checks
//! - [`testing::FakeSystem`] - In-memory implementation of both, for tests
//!
//! ## Extras
//!
//! - [`mount_table`] - Read the OS mount table and filter network mounts
//! - [`fetch`] - Download a remote file to a local cache (feature `fetch`)
//!
//! # Example
//!
//! ```no_run
//! use netvol_mount::{LockCoordinator, MountController, VolumeSpec};
//!
//! # fn main() -> anyhow::Result<()> {
//! let spec = VolumeSpec::builder("files.example.org/Share", "/home/alice/Volumes/Share")
//!     .principal("alice")
//!     .secret("s3cret")
//!     .build()?;
//! let mut controller = MountController::new(spec)?;
//!
//! let report = LockCoordinator::new().with_volume(&mut controller, |volume| {
//!     Ok::<_, anyhow::Error>(std::fs::read_to_string(volume / "reports/latest.csv")?)
//! })?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod controller;
mod error;
mod liveness;
mod lock;
mod navigator;
mod probe;
mod runner;
mod strategy;
mod volume;

#[cfg(feature = "fetch")]
pub mod fetch;
pub mod mount_table;

pub use controller::{MountController, MountState, DEFAULT_POLL_INTERVAL};
pub use error::{CommandOutcome, Result, SpecError, VolumeError, VolumeErrorKind};
pub use liveness::{is_process_alive, local_hostname};
pub use lock::{
    list_markers, write_marker, HolderId, LockCoordinator, LockMarker, ReleaseOutcome,
    VolumeLease, MARKER_SUFFIX,
};
pub use probe::{is_mount_point, MountProbe, SystemProbe};
pub use runner::{CommandRunner, SystemRunner};
pub use strategy::{
    strategy_for, CommandLine, DriveLetterStrategy, MountStrategy, PosixStrategy, Verification,
};
pub use volume::{Platform, VolumeSpec, VolumeSpecBuilder, DEFAULT_MODE, DEFAULT_TIMEOUT_SECS};

/// In-memory command runner and mount probe for tests.
pub mod testing;

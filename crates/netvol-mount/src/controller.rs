//! Mount lifecycle of a single volume.
//!
//! [`MountController`] owns a [`VolumeSpec`] and drives it between
//! [`MountState::Unmounted`] and [`MountState::Mounted`]:
//!
//! ```text
//! Unmounted --mount() ok--> Mounted --unmount() ok--> Unmounted
//! ```
//!
//! A failed `mount()` stays `Unmounted` and removes every directory it
//! created, parents included. A clean `unmount()` removes only the mount
//! point itself.
//! A failed `unmount()` leaves the state untouched.
//!
//! State is never stored. [`MountController::state`] and friends ask the OS
//! every time through the [`MountProbe`]; the only window where the
//! controller "waits" on state is the readiness poll inside `mount()`.
//!
//! Mutating operations take `&mut self`, so transitions through one
//! controller are serialized by the borrow checker. Nothing here locks
//! across processes; that is [`LockCoordinator`](crate::LockCoordinator)'s job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use crate::error::{CommandOutcome, Result, SpecError, VolumeError};
use crate::navigator::join_under;
use crate::probe::{MountProbe, SystemProbe};
use crate::runner::{CommandRunner, SystemRunner};
use crate::strategy::{strategy_for, MountStrategy, Verification};
use crate::volume::{Platform, VolumeSpec};

/// Pause between readiness checks while mounting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Readiness checks per second of timeout.
const CHECKS_PER_SECOND: u64 = 1000;

/// Observed state of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountState {
    /// Root absent, or present but not attached
    Unmounted,
    /// Root present and attached
    Mounted,
}

/// Mounts and unmounts one volume.
pub struct MountController {
    spec: VolumeSpec,
    strategy: Box<dyn MountStrategy>,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn MountProbe>,
    poll_interval: Duration,
}

impl std::fmt::Debug for MountController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountController")
            .field("spec", &self.spec)
            .field("strategy", &self.strategy)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl MountController {
    /// Controller for the platform this binary runs on.
    pub fn new(spec: VolumeSpec) -> Result<Self, SpecError> {
        Self::for_platform(spec, Platform::current())
    }

    /// Controller using the real OS, with an explicit strategy.
    pub fn for_platform(spec: VolumeSpec, platform: Platform) -> Result<Self, SpecError> {
        Self::with_parts(spec, platform, Arc::new(SystemRunner), Arc::new(SystemProbe))
    }

    /// Controller with injected command runner and probe.
    pub fn with_parts(
        spec: VolumeSpec,
        platform: Platform,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn MountProbe>,
    ) -> Result<Self, SpecError> {
        let strategy = strategy_for(platform, &spec)?;
        Ok(Self {
            spec,
            strategy,
            runner,
            probe,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the pause between readiness checks.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The volume this controller owns.
    pub fn spec(&self) -> &VolumeSpec {
        &self.spec
    }

    /// Strategy selected at construction.
    pub fn platform(&self) -> Platform {
        self.strategy.platform()
    }

    /// Local root: the mount path, or the drive root such as `J:/`.
    pub fn root(&self) -> PathBuf {
        self.strategy.root(&self.spec)
    }

    /// Whether the root (directory or drive) exists right now.
    pub fn exists(&self) -> bool {
        self.probe.exists(&self.root())
    }

    /// Whether the volume is attached right now.
    pub fn is_mounted(&self) -> bool {
        match self.strategy.verification(&self.spec) {
            Verification::MountPoint(path) => self.probe.is_mount(&path),
            Verification::Exists(path) => self.probe.exists(&path),
        }
    }

    /// Root exists and the volume is attached.
    pub fn is_active(&self) -> bool {
        self.exists() && self.is_mounted()
    }

    /// Current state as observed from the OS.
    pub fn state(&self) -> MountState {
        if self.is_active() {
            MountState::Mounted
        } else {
            MountState::Unmounted
        }
    }

    /// Absolute path of `relative` under the root.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        join_under(&self.root(), relative.as_ref())
    }

    /// Attach the volume.
    ///
    /// Fails with [`VolumeError::MountPointAlreadyExists`] if the root is
    /// already there; nothing is remounted implicitly. After running the
    /// mount command, polls readiness `timeout * 1000` times one
    /// poll-interval apart. If the volume never shows up, the created
    /// directory is removed and [`VolumeError::MountFailed`] carries the
    /// command's outcome.
    #[instrument(level = "info", name = "volume::mount", skip_all, fields(root = %self.root().display()))]
    pub fn mount(&mut self) -> Result<()> {
        let root = self.root();
        if self.exists() {
            return Err(VolumeError::MountPointAlreadyExists(root));
        }

        // Outermost directory this call creates, removed again on failure
        let created = if self.strategy.manages_mount_point() {
            let top = outermost_missing(&root);
            std::fs::create_dir_all(&root).map_err(|e| VolumeError::io(&root, e))?;
            Some(top)
        } else {
            None
        };

        let command = self.strategy.mount_command(&self.spec);
        tracing::debug!("Running {}", command.redacted(self.spec.secret()));

        let outcome = match self.runner.run(&command) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(top) = &created {
                    remove_created_dirs(&root, top);
                }
                return Err(e);
            }
        };

        let started = Instant::now();
        if !self.wait_until_mounted() {
            tracing::warn!(
                "{} not ready after {:?} ({})",
                root.display(),
                started.elapsed(),
                outcome
            );
            if let Some(top) = &created {
                remove_created_dirs(&root, top);
            }
            return Err(VolumeError::MountFailed { root, outcome });
        }

        tracing::info!(
            "Mounted {} at {} in {:?}",
            self.spec.address(),
            root.display(),
            started.elapsed()
        );
        Ok(())
    }

    /// Detach the volume.
    ///
    /// Fails with [`VolumeError::MountPointMissing`] if the root is gone and
    /// [`VolumeError::VolumeNotMounted`] if it exists but nothing is
    /// attached. If the root is still mounted after the unmount command,
    /// fails with [`VolumeError::UnmountFailed`] and leaves everything as is.
    #[instrument(level = "info", name = "volume::unmount", skip_all, fields(root = %self.root().display()))]
    pub fn unmount(&mut self) -> Result<CommandOutcome> {
        let root = self.root();
        if !self.exists() {
            return Err(VolumeError::MountPointMissing(root));
        }
        if !self.is_mounted() {
            return Err(VolumeError::VolumeNotMounted {
                address: self.spec.address().to_string(),
                root,
            });
        }

        let command = self.strategy.unmount_command(&self.spec);
        tracing::debug!("Running {}", command.redacted(self.spec.secret()));
        let outcome = self.runner.run(&command)?;

        if self.is_mounted() {
            return Err(VolumeError::UnmountFailed { root, outcome });
        }

        if self.strategy.manages_mount_point() {
            std::fs::remove_dir(&root).map_err(|e| VolumeError::io(&root, e))?;
        }

        tracing::info!("Unmounted {} from {}", self.spec.address(), root.display());
        Ok(outcome)
    }

    /// Bounded busy-wait for readiness. Not a retry of the mount command.
    fn wait_until_mounted(&self) -> bool {
        let checks = self.spec.timeout_secs().saturating_mul(CHECKS_PER_SECOND);
        for _ in 0..checks {
            if self.is_mounted() {
                return true;
            }
            std::thread::sleep(self.poll_interval);
        }
        self.is_mounted()
    }

}

/// First ancestor of `root` (or `root` itself) that has to be created.
fn outermost_missing(root: &Path) -> PathBuf {
    let mut top = root;
    while let Some(parent) = top.parent() {
        if parent.as_os_str().is_empty() || parent.exists() {
            break;
        }
        top = parent;
    }
    top.to_path_buf()
}

/// Remove `root` and its ancestors up to and including `top`, innermost first.
fn remove_created_dirs(root: &Path, top: &Path) {
    for dir in root.ancestors() {
        if let Err(e) = std::fs::remove_dir(dir) {
            tracing::warn!(
                "Failed to remove {} after failed mount: {}",
                dir.display(),
                e
            );
            return;
        }
        if dir == top {
            return;
        }
    }
}

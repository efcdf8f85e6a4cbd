//! In-memory stand-in for the OS side of mounting.
//!
//! [`FakeSystem`] implements both [`CommandRunner`] and [`MountProbe`] and
//! understands the commands the two strategies emit (`mount`, `umount`,
//! `net use`). "Mounting" records the root as attached; directories are still
//! created and removed on the real filesystem by the controller, so tests run
//! against a temp dir and can inspect it.
//!
//! Clones share state, which lets several controllers observe the same
//! "mounted" volume the way separate processes would.
//!
//! ```
//! use netvol_mount::testing::FakeSystem;
//! use netvol_mount::{Platform, VolumeSpec};
//!
//! let temp = tempfile::tempdir().unwrap();
//! let spec = VolumeSpec::builder("files.example.org/Share", temp.path().join("Share"))
//!     .build()
//!     .unwrap();
//! let fake = FakeSystem::new();
//! let mut controller = fake.controller(spec, Platform::Posix);
//!
//! controller.mount().unwrap();
//! assert!(controller.is_active());
//! controller.unmount().unwrap();
//! assert_eq!(fake.commands().len(), 2);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::MountController;
use crate::error::{CommandOutcome, VolumeError};
use crate::probe::MountProbe;
use crate::runner::CommandRunner;
use crate::strategy::CommandLine;
use crate::volume::{Platform, VolumeSpec};

/// Exit status the fake `mount` reports when told never to become ready.
pub const FAILED_MOUNT_STATUS: i32 = 32;

#[derive(Debug, Default)]
struct FakeState {
    attached: HashSet<PathBuf>,
    commands: Vec<CommandLine>,
    is_mount_calls: usize,
    never_ready: bool,
    unmount_sticks: bool,
}

/// Scriptable mount table plus command log.
#[derive(Debug, Clone, Default)]
pub struct FakeSystem {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSystem {
    /// Empty mount table, everything succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller wired to this fake.
    ///
    /// # Panics
    ///
    /// Panics if `spec` has no drive and `platform` is
    /// [`Platform::DriveLetter`].
    pub fn controller(&self, spec: VolumeSpec, platform: Platform) -> MountController {
        MountController::with_parts(
            spec,
            platform,
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
        .expect("spec does not fit the requested platform")
    }

    /// Make `mount` exit non-zero without attaching anything.
    pub fn set_never_ready(&self, never_ready: bool) {
        self.state.lock().never_ready = never_ready;
    }

    /// Make `umount` / `net use /delete` leave the volume attached.
    pub fn set_unmount_sticks(&self, sticks: bool) {
        self.state.lock().unmount_sticks = sticks;
    }

    /// Mark `root` attached, as if someone else mounted it.
    pub fn attach(&self, root: impl Into<PathBuf>) {
        self.state.lock().attached.insert(root.into());
    }

    /// Detach `root` out of band, as if someone else unmounted it.
    pub fn detach(&self, root: &Path) {
        self.state.lock().attached.remove(root);
    }

    /// Whether `root` is currently attached.
    pub fn is_attached(&self, root: &Path) -> bool {
        self.state.lock().attached.contains(root)
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<CommandLine> {
        self.state.lock().commands.clone()
    }

    /// Number of `is_mount` probes so far.
    pub fn is_mount_calls(&self) -> usize {
        self.state.lock().is_mount_calls
    }
}

impl CommandRunner for FakeSystem {
    fn run(&self, command: &CommandLine) -> Result<CommandOutcome, VolumeError> {
        let mut state = self.state.lock();
        state.commands.push(command.clone());
        let args = command.args();

        match command.program() {
            "mount" => {
                if state.never_ready {
                    return Ok(CommandOutcome {
                        stderr: "mount error: could not resolve address".to_string(),
                        ..CommandOutcome::exited(FAILED_MOUNT_STATUS)
                    });
                }
                if let Some(target) = args.last() {
                    state.attached.insert(PathBuf::from(target));
                }
            }
            "umount" => {
                if !state.unmount_sticks
                    && let Some(target) = args.first()
                {
                    state.attached.remove(Path::new(target));
                }
            }
            "net" => {
                let Some(device) = args.get(1) else {
                    return Ok(CommandOutcome::exited(1));
                };
                let root = PathBuf::from(format!("{device}/"));
                if args.iter().any(|a| a == "/delete") {
                    if !state.unmount_sticks {
                        state.attached.remove(&root);
                    }
                } else if state.never_ready {
                    return Ok(CommandOutcome {
                        stderr: "System error 53 has occurred.".to_string(),
                        ..CommandOutcome::exited(2)
                    });
                } else {
                    state.attached.insert(root);
                }
            }
            other => {
                return Err(VolumeError::Command {
                    program: other.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "program not known to FakeSystem",
                    ),
                });
            }
        }

        Ok(CommandOutcome::exited(0))
    }
}

impl MountProbe for FakeSystem {
    fn exists(&self, path: &Path) -> bool {
        self.state.lock().attached.contains(path) || path.exists()
    }

    fn is_mount(&self, path: &Path) -> bool {
        let mut state = self.state.lock();
        state.is_mount_calls += 1;
        state.attached.contains(path)
    }
}

//! Path composition on a volume.
//!
//! `&controller / "sub/dir"` resolves through
//! [`MountController::resolve`], so callers write one relative path and get
//! `J:/sub/dir` or `/home/alice/Volumes/Share/sub/dir` depending on the
//! strategy. A leading root or drive prefix on the relative side is dropped
//! so the result always stays under the volume root.
//!
//! Only this direction exists. Prefixing a path with a controller has no
//! meaning and does not compile:
//!
//! ```compile_fail
//! use std::path::PathBuf;
//! use netvol_mount::{MountController, VolumeSpec};
//!
//! let spec = VolumeSpec::builder("host/share", "/mnt/share").build().unwrap();
//! let controller = MountController::new(spec).unwrap();
//! let _ = PathBuf::from("/tmp") / &controller;
//! ```

use std::ops::Div;
use std::path::{Component, Path, PathBuf};

use crate::controller::MountController;
use crate::lock::VolumeLease;

/// Join `relative` under `root`, ignoring any root or prefix on `relative`.
pub(crate) fn join_under(root: &Path, relative: &Path) -> PathBuf {
    let mut out = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl<P: AsRef<Path>> Div<P> for &MountController {
    type Output = PathBuf;

    fn div(self, relative: P) -> PathBuf {
        self.resolve(relative)
    }
}

impl<P: AsRef<Path>> Div<P> for &VolumeLease<'_> {
    type Output = PathBuf;

    fn div(self, relative: P) -> PathBuf {
        self.resolve(relative)
    }
}

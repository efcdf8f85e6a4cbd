//! Unmount command - detach a configured volume.
//!
//! Removes this host's `netvol mount` marker, then refuses while any other
//! holder still has a lock marker on the volume, since unmounting would pull
//! the share out from under it. `--force` unmounts anyway and leaves the
//! other markers in place.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use netvol_mount::{list_markers, write_marker, HolderId};

use super::{inspect_volume, manual_holder};
use crate::config::Config;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name from the config (`shared` or `@shared`)
    pub volume: String,

    /// Unmount even if other holders have lock markers on the volume
    #[arg(short, long)]
    pub force: bool,
}

/// Unmount refused because holders remain.
#[derive(Debug)]
pub struct VolumeBusy {
    pub root: PathBuf,
    pub holders: Vec<String>,
}

impl fmt::Display for VolumeBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is still held by {} (use --force to unmount anyway)",
            self.root.display(),
            self.holders.join(", ")
        )
    }
}

impl std::error::Error for VolumeBusy {}

#[instrument(level = "info", name = "cmd::unmount", skip_all, fields(volume = %args.volume))]
pub fn execute(args: &Args, config: &Config) -> Result<()> {
    let mut controller = inspect_volume(config, &args.volume)?;
    let root = controller.root();
    let manual = manual_holder();

    let released_manual = if controller.is_active() {
        prepare_unmount(&root, &manual, args.force)?
    } else {
        false
    };

    if let Err(e) = controller.unmount() {
        if released_manual && let Err(restore_err) = write_marker(&root, &manual) {
            tracing::warn!("Failed to restore {manual} marker: {restore_err}");
        }
        return Err(e).with_context(|| format!("Failed to unmount '{}'", args.volume));
    }

    eprintln!("Unmounted {}", root.display());
    Ok(())
}

/// Check that only `manual` holds `root` (unless `force`), then remove its
/// marker. Returns whether a `manual` marker was removed.
fn prepare_unmount(root: &Path, manual: &HolderId, force: bool) -> Result<bool> {
    let (own, others): (Vec<_>, Vec<_>) = list_markers(root)?
        .into_iter()
        .partition(|m| &m.holder == manual);

    if !force && !others.is_empty() {
        return Err(VolumeBusy {
            root: root.to_path_buf(),
            holders: others.iter().map(|m| m.holder.to_string()).collect(),
        }
        .into());
    }

    for marker in &own {
        marker.remove()?;
    }
    Ok(!own.is_empty())
}

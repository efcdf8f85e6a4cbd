//! Mount command - attach a configured volume and leave it attached.
//!
//! Writes this host's `manual@<host>` lock marker so the scoped commands
//! (`ls`, `exec`) see another holder and leave the volume mounted when they
//! release. The marker stays until `netvol unmount` removes it.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use netvol_mount::write_marker;

use super::{manual_holder, open_volume};
use crate::config::Config;
use crate::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name from the config (`shared` or `@shared`)
    pub volume: String,
}

#[instrument(level = "info", name = "cmd::mount", skip_all, fields(volume = %args.volume))]
pub fn execute(args: &Args, config: &Config, password: &PasswordOptions) -> Result<()> {
    let mut controller = open_volume(config, &args.volume, password)?;

    controller
        .mount()
        .with_context(|| format!("Failed to mount '{}'", args.volume))?;

    if let Err(e) = write_marker(&controller.root(), &manual_holder()) {
        if let Err(unmount_err) = controller.unmount() {
            tracing::warn!("Failed to unmount after marker write failed: {unmount_err}");
        }
        return Err(e).with_context(|| format!("Failed to mark '{}' as mounted", args.volume));
    }

    eprintln!(
        "Mounted {} at {}",
        controller.spec().address(),
        controller.root().display()
    );
    Ok(())
}

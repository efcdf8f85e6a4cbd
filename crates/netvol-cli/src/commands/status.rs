//! Status command - report a volume's root, state and holders.

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use netvol_mount::{list_markers, LockMarker, MountState};

use super::inspect_volume;
use crate::config::Config;
use crate::output::format_age;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name from the config (`shared` or `@shared`)
    pub volume: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusOutput {
    volume: String,
    address: String,
    platform: String,
    root: String,
    exists: bool,
    mounted: bool,
    markers: Vec<LockMarker>,
}

#[instrument(level = "info", name = "cmd::status", skip_all, fields(volume = %args.volume))]
pub fn execute(args: &Args, config: &Config) -> Result<()> {
    let controller = inspect_volume(config, &args.volume)?;

    let exists = controller.exists();
    let mounted = controller.state() == MountState::Mounted;
    let markers = if mounted {
        list_markers(&controller.root())?
    } else {
        Vec::new()
    };

    let status = StatusOutput {
        volume: args.volume.trim_start_matches('@').to_string(),
        address: controller.spec().address().to_string(),
        platform: controller.platform().to_string(),
        root: controller.root().display().to_string(),
        exists,
        mounted,
        markers,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Volume:   @{}", status.volume);
    println!("Address:  {}", status.address);
    println!("Root:     {} ({})", status.root, status.platform);
    let state = match (status.exists, status.mounted) {
        (_, true) => "mounted",
        (true, false) => "not mounted (root exists)",
        (false, false) => "not mounted",
    };
    println!("State:    {state}");

    if status.mounted {
        if status.markers.is_empty() {
            println!("Holders:  none");
        } else {
            println!("Holders:");
            for marker in &status.markers {
                let age = marker.created_at.map_or_else(|| "unknown".to_string(), format_age);
                println!("  {} ({age})", marker.holder);
            }
        }
    }

    Ok(())
}

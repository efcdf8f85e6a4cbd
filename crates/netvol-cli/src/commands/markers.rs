//! Markers command - list the lock markers on a volume.
//!
//! Markers of crashed holders are never expired automatically. With
//! `--prune-dead`, markers whose holder is a process on this host that is
//! no longer running are removed; holders on other hosts are left alone.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color};
use serde::Serialize;
use tracing::instrument;

use netvol_mount::{list_markers, LockMarker, VolumeError};

use super::inspect_volume;
use crate::config::Config;
use crate::output::{create_table, format_age};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name from the config (`shared` or `@shared`)
    pub volume: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Remove markers left behind by dead processes on this host
    #[arg(long)]
    pub prune_dead: bool,
}

#[derive(Serialize)]
struct MarkerEntry<'a> {
    #[serde(flatten)]
    marker: &'a LockMarker,
    alive: Option<bool>,
    pruned: bool,
}

#[instrument(level = "info", name = "cmd::markers", skip_all, fields(volume = %args.volume))]
pub fn execute(args: &Args, config: &Config) -> Result<()> {
    let controller = inspect_volume(config, &args.volume)?;
    let root = controller.root();
    if !controller.exists() {
        return Err(VolumeError::MountPointMissing(root).into());
    }

    let markers = list_markers(&root)?;
    let mut entries = Vec::with_capacity(markers.len());
    for marker in &markers {
        let alive = marker.holder_alive();
        let pruned = args.prune_dead && alive == Some(false);
        if pruned {
            marker.remove()?;
            tracing::info!("Removed marker of dead holder {}", marker.holder);
        }
        entries.push(MarkerEntry {
            marker,
            alive,
            pruned,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No lock markers on {}.", root.display());
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Holder", "Created", "Alive"]);
    for entry in &entries {
        let created = entry
            .marker
            .created_at
            .map_or_else(|| "unknown".to_string(), format_age);
        let alive = match (entry.alive, entry.pruned) {
            (_, true) => Cell::new("dead (removed)").fg(Color::Red),
            (Some(true), _) => Cell::new("yes").fg(Color::Green),
            (Some(false), _) => Cell::new("dead").fg(Color::Red),
            (None, _) => Cell::new("unknown").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(entry.marker.holder.as_str()),
            Cell::new(created),
            alive,
        ]);
    }
    println!("{table}");

    let pruned = entries.iter().filter(|e| e.pruned).count();
    let remaining = entries.len() - pruned;
    if pruned > 0 {
        eprintln!("Removed {pruned} stale marker(s), {remaining} remaining");
        if remaining == 0 && controller.is_mounted() {
            eprintln!(
                "Nobody holds {} any more; run 'netvol unmount {}' to release it.",
                root.display(),
                args.volume
            );
        }
    }

    Ok(())
}

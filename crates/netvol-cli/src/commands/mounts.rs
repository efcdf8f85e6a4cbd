//! Mounts command - list network filesystems from the OS mount table.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color};
use tracing::instrument;

use netvol_mount::mount_table::{is_network_fstype, network_mounts, system_mounts, SystemMount};

use crate::output::create_table;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Include local filesystems
    #[arg(long)]
    pub all: bool,
}

#[instrument(level = "info", name = "cmd::mounts", skip_all)]
pub fn execute(args: &Args) -> Result<()> {
    let mounts = if args.all {
        system_mounts()?
    } else {
        network_mounts()?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&mounts)?);
        return Ok(());
    }

    if mounts.is_empty() {
        eprintln!("No network volumes mounted.");
        eprintln!("Use 'netvol mount <volume>' to mount one.");
        return Ok(());
    }

    output_table(&mounts);
    eprintln!();
    eprintln!("{} mount(s)", mounts.len());
    Ok(())
}

fn output_table(mounts: &[SystemMount]) {
    let mut table = create_table();
    table.set_header(vec!["Mountpoint", "Type", "Source"]);

    for mount in mounts {
        let type_cell = Cell::new(&mount.fstype).fg(match mount.fstype.as_str() {
            "smbfs" | "cifs" | "smb3" => Color::Blue,
            "nfs" | "nfs4" => Color::Magenta,
            t if is_network_fstype(t) => Color::Yellow,
            _ => Color::White,
        });

        table.add_row(vec![
            Cell::new(mount.mountpoint.display()),
            type_cell,
            Cell::new(&mount.fsname),
        ]);
    }

    println!("{table}");
}

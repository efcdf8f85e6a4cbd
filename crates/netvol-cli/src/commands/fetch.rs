//! Fetch command - refresh the local copy of a configured remote file.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use netvol_mount::fetch::RemoteFile;

use crate::config::{expand_path, Config};
use crate::output::format_size;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// File name from the config's [files] section (`form` or `@form`)
    pub name: String,
}

#[instrument(level = "info", name = "cmd::fetch", skip_all, fields(name = %args.name))]
pub fn execute(args: &Args, config: &Config) -> Result<()> {
    let entry = config.file(&args.name)?;
    let local_path = expand_path(&entry.path)?;

    let remote = RemoteFile::new(&entry.url, &local_path)?;
    let bytes = remote
        .update()
        .with_context(|| format!("Failed to fetch {}", entry.url))?;

    eprintln!("Fetched {} to {}", format_size(bytes), local_path.display());
    Ok(())
}

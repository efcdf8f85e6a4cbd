//! List command - list a directory on a volume.
//!
//! The volume is acquired for the duration of the listing: mounted if
//! needed, marked as in use, and released afterwards (unmounted again if
//! nobody else holds it).
//!
//! # Examples
//!
//! ```bash
//! # List the configured subdir (or the root)
//! netvol ls @shared
//!
//! # List with details
//! netvol ls -l @shared reports/2024
//!
//! # Output as JSON for scripting
//! netvol ls --json @shared | jq '.entries[].name'
//! ```

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use netvol_mount::LockCoordinator;

use super::open_volume;
use crate::config::Config;
use crate::output::{create_table, format_entry_type, format_modified, format_size};
use crate::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name from the config (`shared` or `@shared`)
    pub volume: String,

    /// Path on the volume (default: the volume's subdir, else its root)
    pub path: Option<String>,

    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,

    /// Show hidden entries, including lock markers
    #[arg(short, long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for ls command
#[derive(Serialize)]
struct LsOutput {
    path: String,
    entries: Vec<EntryInfo>,
}

#[derive(Serialize)]
struct EntryInfo {
    name: String,
    #[serde(rename = "type")]
    entry_type: &'static str,
    size: u64,
    #[serde(skip)]
    modified: Option<std::time::SystemTime>,
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(volume = %args.volume))]
pub fn execute(args: &Args, config: &Config, password: &PasswordOptions) -> Result<()> {
    let relative = args
        .path
        .clone()
        .or_else(|| config.volume(&args.volume).ok()?.subdir.clone())
        .unwrap_or_default();

    let mut controller = open_volume(config, &args.volume, password)?;
    let (dir, entries) = LockCoordinator::new().with_volume(&mut controller, |volume| {
        let dir = volume / &relative;
        let entries = read_entries(&dir, args.all)?;
        Ok::<_, anyhow::Error>((dir, entries))
    })?;

    if args.json {
        let output = LsOutput {
            path: dir.display().to_string(),
            entries,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if args.long {
        let mut table = create_table();
        table.set_header(vec!["Type", "Size", "Modified", "Name"]);
        for entry in &entries {
            table.add_row(vec![
                entry.entry_type.to_string(),
                format_size(entry.size),
                entry.modified.map(format_modified).unwrap_or_default(),
                entry.name.clone(),
            ]);
        }
        println!("{table}");
    } else {
        for entry in &entries {
            println!("{}", entry.name);
        }
    }

    Ok(())
}

fn read_entries(dir: &Path, show_hidden: bool) -> Result<Vec<EntryInfo>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !show_hidden && name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type().ok();
        let metadata = entry.metadata().ok();
        entries.push(EntryInfo {
            name,
            entry_type: format_entry_type(
                file_type.is_some_and(|t| t.is_dir()),
                file_type.is_some_and(|t| t.is_symlink()),
            ),
            size: metadata.as_ref().map_or(0, std::fs::Metadata::len),
            modified: metadata.and_then(|m| m.modified().ok()),
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_entries_hides_markers() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "bb").unwrap();
        fs::create_dir(temp.path().join("a")).unwrap();
        fs::write(temp.path().join(".123@host.lock"), "").unwrap();

        let visible = read_entries(temp.path(), false).unwrap();
        let names: Vec<_> = visible.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b.txt"]);
        assert_eq!(visible[0].entry_type, "d");
        assert_eq!(visible[1].size, 2);

        let all = read_entries(temp.path(), true).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_read_entries_rejects_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("f"), "").unwrap();
        assert!(read_entries(&temp.path().join("f"), false).is_err());
    }
}

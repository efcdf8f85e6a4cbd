#![deny(unsafe_code)]

mod auth;
mod commands;
mod config;
mod exit_code;
mod output;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use netvol_mount::fetch::FetchError;
use netvol_mount::{SpecError, VolumeError};

use crate::commands::{completions, exec, fetch, ls, markers, mount, mounts, status, unmount};
use crate::config::Config;

/// Mount SMB network volumes and share them between processes
#[derive(Parser)]
#[command(name = "netvol")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Mount a configured volume and leave it mounted
    netvol mount @shared

    # List a directory, mounting only for the duration of the listing
    netvol ls @shared reports/2024

    # Run a command with the volume mounted (pipe the password in)
    echo \"$SECRET\" | netvol --password-stdin exec @shared -- make report

    # Who else is using the volume?
    netvol markers @shared
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (default: $NETVOL_CONFIG_DIR/config.toml or ~/.config/netvol/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Share password (insecure, prefer --password-stdin or NETVOL_PASSWORD)
    #[arg(long, env = "NETVOL_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Read password from stdin (single line)
    #[arg(long, conflicts_with = "password", global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Password options extracted from the CLI
#[derive(Clone, Default)]
pub struct PasswordOptions {
    pub password: Option<String>,
    pub password_stdin: bool,
}

impl From<&Cli> for PasswordOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            password: cli.password.clone(),
            password_stdin: cli.password_stdin,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a volume and leave it mounted
    Mount(mount::Args),

    /// Unmount a volume
    Unmount(unmount::Args),

    /// Show whether a volume is mounted and who holds it
    Status(status::Args),

    /// List a directory on a volume
    Ls(ls::Args),

    /// Mount a volume, run a command on it, then release it
    Exec(exec::Args),

    /// List or prune lock markers on a mounted volume
    Markers(markers::Args),

    /// List network filesystems mounted on this machine
    Mounts(mounts::Args),

    /// Download a configured remote file to its local cache path
    Fetch(fetch::Args),

    /// Generate shell completions
    Completions(completions::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // `cli` was consumed by run(), so -q is read back from argv
            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet && e.downcast_ref::<exec::ChildExit>().is_none() {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let password_opts = PasswordOptions::from(&cli);

    let config_file = cli.config.clone();
    let load_config = || Config::load(config_file.as_deref());

    match cli.command {
        Commands::Mount(args) => mount::execute(&args, &load_config()?, &password_opts),
        Commands::Unmount(args) => unmount::execute(&args, &load_config()?),
        Commands::Status(args) => status::execute(&args, &load_config()?),
        Commands::Ls(args) => ls::execute(&args, &load_config()?, &password_opts),
        Commands::Exec(args) => exec::execute(&args, &load_config()?, &password_opts),
        Commands::Markers(args) => markers::execute(&args, &load_config()?),
        Commands::Fetch(args) => fetch::execute(&args, &load_config()?),
        Commands::Mounts(args) => mounts::execute(&args),
        Commands::Completions(args) => completions::execute(&args),
    }
}

/// Get the share password using the priority chain:
/// 1. --password-stdin
/// 2. --password / NETVOL_PASSWORD
/// 3. Interactive prompt
pub fn get_password(opts: &PasswordOptions, account: &str) -> Result<String> {
    if opts.password_stdin {
        read_password_from_stdin()
    } else if let Some(ref password) = opts.password {
        Ok(password.clone())
    } else {
        auth::prompt_password(account)
    }
}

/// Read password from stdin (first line only)
fn read_password_from_stdin() -> Result<String> {
    if io::stdin().is_terminal() {
        anyhow::bail!(
            "--password-stdin requires the password to be piped in.\n\
             Example: echo \"$SECRET\" | netvol --password-stdin mount @shared"
        );
    }

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    let password = password.trim_end_matches('\n').trim_end_matches('\r');

    if password.is_empty() {
        anyhow::bail!("Password from stdin cannot be empty");
    }

    Ok(password.to_string())
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(child) = cause.downcast_ref::<exec::ChildExit>() {
            return child.code;
        }

        if cause.downcast_ref::<unmount::VolumeBusy>().is_some() {
            return exit_code::VOLUME_BUSY;
        }

        if let Some(volume_err) = cause.downcast_ref::<VolumeError>() {
            return match volume_err {
                VolumeError::MountPointAlreadyExists(_) => exit_code::VOLUME_BUSY,
                VolumeError::MountPointMissing(_) => exit_code::NOT_FOUND,
                VolumeError::MountFailed { .. }
                | VolumeError::UnmountFailed { .. }
                | VolumeError::VolumeNotMounted { .. } => exit_code::MOUNT_FAILED,
                VolumeError::Command { source, .. } | VolumeError::Io { source, .. } => {
                    match source.kind() {
                        io::ErrorKind::PermissionDenied => exit_code::PERMISSION_DENIED,
                        io::ErrorKind::NotFound => exit_code::NOT_FOUND,
                        _ => exit_code::MOUNT_FAILED,
                    }
                }
            };
        }

        if cause.downcast_ref::<SpecError>().is_some()
            || cause.downcast_ref::<toml::de::Error>().is_some()
        {
            return exit_code::CONFIG_INVALID;
        }

        if let Some(fetch_err) = cause.downcast_ref::<FetchError>() {
            if let FetchError::Status { status, .. } = fetch_err
                && status.as_u16() == 404
            {
                return exit_code::NOT_FOUND;
            }
            if let FetchError::Io { source, .. } = fetch_err
                && source.kind() == io::ErrorKind::PermissionDenied
            {
                return exit_code::PERMISSION_DENIED;
            }
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::PermissionDenied => return exit_code::PERMISSION_DENIED,
                io::ErrorKind::NotFound => return exit_code::NOT_FOUND,
                io::ErrorKind::Interrupted => return exit_code::CANCELLED,
                _ => {}
            }
        }
    }

    // Fallback to string matching for errors without typed variants
    let msg = format!("{e:#}").to_lowercase();
    if msg.contains("not configured") {
        exit_code::CONFIG_INVALID
    } else if msg.contains("--password-stdin requires") {
        exit_code::USAGE_ERROR
    } else if msg.contains("password") && msg.contains("cannot be empty") {
        exit_code::AUTH_FAILED
    } else if msg.contains("cancelled") || msg.contains("interrupted") {
        exit_code::CANCELLED
    } else {
        exit_code::GENERAL_ERROR
    }
}

//! Exec command - acquire a volume, run a command on it, then release it.
//!
//! The volume is released whether the command succeeds, fails, or is
//! interrupted: Ctrl-C goes to the child, and netvol waits for it before
//! removing its lock marker. The child's exit status becomes netvol's.
//!
//! Example:
//! ```bash
//! netvol exec @shared -- ls -la
//! netvol exec @shared --cd reports -- python summarize.py
//! netvol exec @shared -- bash  # interactive shell
//! ```

use std::fmt;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use netvol_mount::LockCoordinator;

use super::open_volume;
use crate::config::Config;
use crate::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name from the config (`shared` or `@shared`)
    pub volume: String,

    /// Working directory on the volume (default: the volume's subdir, else its root)
    #[arg(long, value_name = "PATH")]
    pub cd: Option<String>,

    /// Command and arguments to execute
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// The child exited unsuccessfully; carries the exit code to forward.
#[derive(Debug)]
pub struct ChildExit {
    pub program: String,
    pub code: u8,
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} exited with status {}", self.program, self.code)
    }
}

impl std::error::Error for ChildExit {}

impl ChildExit {
    fn from_status(program: &str, status: ExitStatus) -> Self {
        // Killed by a signal: no code, report a generic failure
        let code = status
            .code()
            .and_then(|c| u8::try_from(c).ok())
            .filter(|&c| c != 0)
            .unwrap_or(1);
        Self {
            program: program.to_string(),
            code,
        }
    }
}

#[instrument(level = "info", name = "cmd::exec", skip_all, fields(volume = %args.volume))]
pub fn execute(args: &Args, config: &Config, password: &PasswordOptions) -> Result<()> {
    let (program, cmd_args) = args
        .command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("No command specified"))?;

    let relative = args
        .cd
        .clone()
        .or_else(|| config.volume(&args.volume).ok()?.subdir.clone())
        .unwrap_or_default();

    let mut controller = open_volume(config, &args.volume, password)?;

    // The child shares our process group and gets SIGINT itself; we only
    // need to survive it long enough to release.
    ctrlc::set_handler(|| {
        eprintln!("\nInterrupted, waiting for command to exit...");
    })
    .context("Failed to set signal handler")?;

    let status = LockCoordinator::new().with_volume(&mut controller, |volume| {
        let cwd = volume / &relative;
        tracing::info!("Running {} in {}", program, cwd.display());

        Command::new(program)
            .args(cmd_args)
            .current_dir(&cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to execute command: {program}"))
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(ChildExit::from_status(program, status).into())
    }
}

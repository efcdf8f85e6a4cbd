//! Running external commands.

use std::process::{Command, Stdio};

use crate::error::{CommandOutcome, VolumeError};
use crate::strategy::CommandLine;

/// Executes an argument vector and reports how it went.
///
/// A non-zero exit is an `Ok` outcome; only failing to start the program is
/// an error. Callers decide what a non-zero exit means.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion.
    fn run(&self, command: &CommandLine) -> Result<CommandOutcome, VolumeError>;
}

/// Runs commands through [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutcome, VolumeError> {
        let output = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| VolumeError::Command {
                program: command.program().to_string(),
                source,
            })?;

        let outcome = CommandOutcome {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        if !outcome.success() {
            tracing::debug!("{} exited unsuccessfully: {}", command.program(), outcome);
        }

        Ok(outcome)
    }
}

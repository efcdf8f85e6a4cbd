//! Shell completion generation for the netvol CLI.
//!
//! # Examples
//!
//! ```bash
//! # Bash (add to ~/.bashrc)
//! eval "$(netvol completions bash)"
//!
//! # Fish (save to completions directory)
//! netvol completions fish > ~/.config/fish/completions/netvol.fish
//! ```

use std::io;

use anyhow::Result;
use clap::{Args as ClapArgs, CommandFactory};
use clap_complete::{generate, Shell};

use crate::Cli;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn execute(args: &Args) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "netvol", &mut io::stdout());
    Ok(())
}

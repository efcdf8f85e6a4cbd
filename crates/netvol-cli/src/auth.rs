use anyhow::{bail, Result};
use rpassword::read_password;
use std::io::{self, Write};

/// Prompt for the share password without echoing it.
///
/// For non-interactive use, pass `--password-stdin` or set `NETVOL_PASSWORD`.
pub fn prompt_password(account: &str) -> Result<String> {
    if account.is_empty() {
        eprint!("Share password: ");
    } else {
        eprint!("Password for {account}: ");
    }
    io::stderr().flush()?;

    let password = read_password()?;

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    Ok(password)
}

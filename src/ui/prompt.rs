//! Interactive prompts using dialoguer.
//!
//! All functions gracefully handle non-TTY environments.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::io::IsTerminal;

/// Confirmation prompt with default value.
///
/// In non-TTY mode (scripts, CI), returns the default without prompting.
pub fn confirm(message: &str, default: bool) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(default);
    }

    let result = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .default(default)
        .interact()?;

    Ok(result)
}

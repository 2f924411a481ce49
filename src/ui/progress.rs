//! Progress indicators: spinners and progress bars.
//!
//! All functions gracefully degrade when not in a TTY. Progress ticks are
//! also skipped in verbose mode so the bar does not interleave with the
//! echoed git commands.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

use crate::context::ExecutionContext;

use super::style::*;

/// Create a spinner for indeterminate operations.
///
/// Returns `Some(ProgressBar)` in TTY mode, `None` otherwise.
/// When not in TTY, prints a plain step message instead.
pub fn spinner(message: &str) -> Option<ProgressBar> {
    if !std::io::stdout().is_terminal() || ExecutionContext::is_verbose() {
        println!("{} {}", MARK_STEP.blue(), message);
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars(SPINNER_FRAMES)
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

/// Finish spinner with success message.
pub fn spinner_success(spinner: Option<ProgressBar>, message: &str) {
    match spinner {
        Some(pb) => {
            pb.finish_with_message(format!("{} {}", MARK_SUCCESS.green(), message));
        }
        None => {
            println!("  {} {}", MARK_SUCCESS.green(), message);
        }
    }
}

/// Create a progress bar for counted operations.
///
/// Returns `Some(ProgressBar)` in TTY mode, `None` otherwise. Verbose mode
/// disables the bar entirely so echoed commands stay readable.
pub fn progress_bar(total: u64, message: &str) -> Option<ProgressBar> {
    if !std::io::stdout().is_terminal() || ExecutionContext::is_verbose() {
        println!("{} {} ({})", MARK_STEP.blue(), message, total);
        return None;
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.blue} {msg} [{bar:30.cyan/dim}] {pos}/{len}")
            .expect("Invalid progress bar template")
            .tick_chars(SPINNER_FRAMES)
            .progress_chars("━━╺"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

/// Increment progress bar.
pub fn progress_inc(pb: &Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.inc(1);
    }
}

/// Finish progress bar and clear it from the terminal.
pub fn progress_finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

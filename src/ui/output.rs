//! Output functions for consistent message formatting.
//!
//! These functions replace ad-hoc println! calls with semantic output.

use colored::Colorize;

use super::style::*;

/// Print success message: "✓ {message}" in green
pub fn success(message: &str) {
    println!("{} {}", MARK_SUCCESS.green(), message);
}

/// Print error message to stderr: "✗ {message}" in red
pub fn error_stderr(message: &str) {
    eprintln!("{} {}", MARK_ERROR.red(), message);
}

/// Print warning message: "! {message}" in yellow
pub fn warning(message: &str) {
    println!("{} {}", MARK_WARNING.yellow().bold(), message);
}

/// Print step/progress message: "→ {message}" in blue
pub fn step(message: &str) {
    println!("{} {}", MARK_STEP.blue(), message);
}

/// Print indented item: "  • {message}"
pub fn bullet(message: &str) {
    println!("  {} {}", MARK_BULLET, message);
}

//! Style constants and color helpers.
//!
//! Centralizes all styling decisions for consistent output.

use colored::{ColoredString, Colorize};

/// Success marker: ✓
pub const MARK_SUCCESS: &str = "✓";
/// Error/failure marker: ✗
pub const MARK_ERROR: &str = "✗";
/// Warning marker: !
pub const MARK_WARNING: &str = "!";
/// Progress/step marker: →
pub const MARK_STEP: &str = "→";
/// Bullet marker: •
pub const MARK_BULLET: &str = "•";

/// Braille spinner frames
pub const SPINNER_FRAMES: &str = "⡀⡄⡆⡇⠇⠏⠋⠉";

/// Format a branch name (green)
pub fn branch_style<S: AsRef<str>>(s: S) -> ColoredString {
    s.as_ref().green()
}

/// Format command text (cyan)
pub fn cmd_style<S: AsRef<str>>(s: S) -> ColoredString {
    s.as_ref().cyan()
}

/// Format subdued/secondary text (bright black/gray)
pub fn dim_style<S: AsRef<str>>(s: S) -> ColoredString {
    s.as_ref().bright_black()
}

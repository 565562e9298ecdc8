//! Warning output for degraded input.
//!
//! The pattern surface never fails on malformed user input; it falls back to
//! a documented default and reports the fallback here.

#[cfg(feature = "colored")]
use colored::Colorize;

/// Print a warning line to stderr.
pub(crate) fn warn(msg: &str) {
    #[cfg(feature = "colored")]
    eprintln!("{} {}", "warning:".yellow(), msg);
    #[cfg(not(feature = "colored"))]
    eprintln!("warning: {}", msg);
}

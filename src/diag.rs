//! Diagnostic output: one-line, program-prefixed messages on `stderr`.
//!
//! Fatal messages are built here but never exit the process directly —
//! `main` is the sole `std::process::exit` call site.

use std::io::Write;

/// Prints a non-fatal warning, e.g. a file that extends past the
/// declared image size. Flushed immediately so it interleaves correctly
/// with any verbose output already written to stdout.
pub fn warn(prog: &str, msg: &str) {
    eprintln!("{prog}: warning: {msg}");
    let _ = std::io::stderr().flush();
}

/// Formats the single diagnostic line for a fatal error, prefixed by the
/// program name.
pub fn fatal_line(prog: &str, msg: &str) -> String {
    format!("{prog}: {msg}")
}

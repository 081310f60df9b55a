//! Minimal colored logging, in the teacher's own idiom: direct
//! `println!`/`eprintln!` calls tagged and colorized with `owo-colors`
//! rather than a `tracing` subscriber (see `operator/src/strims/reconcile.rs`
//! in the pack, which colors its reconciliation log lines the same way).

use owo_colors::OwoColorize;

/// Informational log line, printed to stdout with a green `INFO` tag.
pub fn info(msg: impl AsRef<str>) {
    println!("{} {}", "INFO".green(), msg.as_ref());
}

/// Warning log line, printed to stderr with a yellow `WARN` tag.
pub fn warn(msg: impl AsRef<str>) {
    eprintln!("{} {}", "WARN".yellow(), msg.as_ref());
}

/// Error log line, printed to stderr with a red `ERROR` tag.
pub fn error(msg: impl AsRef<str>) {
    eprintln!("{} {}", "ERROR".red(), msg.as_ref());
}

//! Ambient stack shared by the replica controller binary: colored
//! structured logging, the CLI flag fragments from spec.md §6, and the
//! graceful-shutdown signal future.

pub mod cli;
pub mod log;
pub mod shutdown;

/// Toggles `owo_colors`'s global color override from the `DISABLE_COLORS`
/// environment variable, mirroring `eosin-platform-eosin`'s
/// `common::init()`. Call once at process start, before any logging.
pub fn init_colors() {
    let disable = std::env::var("DISABLE_COLORS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    owo_colors::set_override(!disable);
}

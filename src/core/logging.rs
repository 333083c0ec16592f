//! Logging setup
//!
//! All modules log through `tracing` macros with a bracketed component tag
//! (`[SESSION]`, `[MANAGER]`, `[TIMER]`, `[ENGINE]`, `[NET]`, ...). The binary
//! installs a `tracing-subscriber` formatter once at startup; library users are
//! free to install their own subscriber instead.

use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this twice is
/// harmless: the second install fails silently.
///
/// # Example
///
/// ```rust,ignore
/// logging::init_tracing("xfchess_session=debug");
/// ```
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

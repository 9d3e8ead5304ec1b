#![forbid(unsafe_code)]

//! Subscriber setup for hosts that do not install their own.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! host's call. This helper covers the common case.

use tracing_subscriber::EnvFilter;

/// Environment variable read by [`init`] for the filter directive.
pub const LOG_ENV: &str = "TVNAV_LOG";

/// Build the filter: `TVNAV_LOG`, then `RUST_LOG`, then `info`.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global fmt subscriber.
///
/// Returns false if a global subscriber was already set.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .try_init()
        .is_ok()
}

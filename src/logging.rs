//! Diagnostic logging for the `prereq` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a compact stderr subscriber.
///
/// `verbose` lowers the default filter from `warn` to `debug`. `RUST_LOG`
/// overrides either. Calling this twice is harmless; the second call is
/// ignored.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "prereq=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

//! JSON tracing subscriber for the ledger.
//!
//! The engine emits `tracing` events on every authorization failure and
//! settlement rejection; this module wires them to stdout as JSON lines.
//! `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

const DEFAULT_FILTER: &str = "info";

/// Install the process-wide subscriber.
///
/// Idempotent: the engine's scenario suite calls this from every test, so
/// `try_init` swallows the already-installed error instead of panicking.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(SystemTime)
        .with_target(false)
        .try_init();
}

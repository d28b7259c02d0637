//! Structured JSON logging setup using tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with JSON logging.
///
/// `RUST_LOG` takes precedence over `filter` (e.g. "info,crmsync=debug").
/// Calling it twice is a no-op.
pub fn init_logging(filter: &str) {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log filter {filter:?}: {e}, falling back to info");
            EnvFilter::new("info")
        });

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .flatten_event(true);

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!(filter = %filter, "Logging initialized");
    }
}

/// Initialize logging for tests (with simpler output).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

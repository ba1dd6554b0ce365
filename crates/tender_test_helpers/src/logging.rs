//! Tracing setup for tests
//!
//! Tests share one process-wide subscriber; initialization is guarded
//! so any test can call `init()` without caring about ordering.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize a test-friendly tracing subscriber
///
/// Respects `RUST_LOG` when set, defaults to `warn` so passing tests
/// stay quiet.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

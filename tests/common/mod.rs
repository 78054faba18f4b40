//! Shared helpers for integration tests

pub mod builders;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once, honoring `RUST_LOG`
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

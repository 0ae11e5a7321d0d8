//! Test logging configuration utilities

use std::sync::Once;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Route engine logs at `level` to the test writer
///
/// Only the first call per test process installs a subscriber. Third-party
/// crates stay at `warn`; `RUST_LOG` replaces the whole filter when set.
pub fn init_test_logging(level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,wrench_sync={0},wrench_cli={0}", level)));

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Keep engine output down to errors, e.g. the drop notices
pub fn suppress_logs() {
    init_test_logging("error");
}

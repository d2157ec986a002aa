//! Shared scaffolding for the crate's integration test binaries.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing-subscriber` fmt layer driven by `RUST_LOG`, once per test
/// process, so running with e.g. `RUST_LOG=scrollback_index=debug` surfaces the
/// crate's own `open`/`update`/rebuild/summary-construction events during a test
/// run instead of them going nowhere.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

//! Integration tests for duet-client.
//!
//! - `negotiation_tests` - roles, offer/answer, candidate buffering
//! - `session_tests` - stale events, teardown, layout, failures
//! - `chat_tests` - server path, data channel mirror, typing fallback


use tracing::Level;

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

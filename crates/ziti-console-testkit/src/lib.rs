//! Test infrastructure for the Ziti console crates.
//!
//! - [`FakeManagementApi`]: in-memory collections, scripted responses, call
//!   recording, and gates that hold a response back until released.
//! - [`RecordingNotifier`]: captures notifications for assertions.
//! - [`fixtures`]: controller-shaped JSON builders.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

mod fake_api;
pub mod fixtures;
mod notifier;

pub use fake_api::{ApiCall, FakeManagementApi, Gate};
pub use notifier::RecordingNotifier;

/// Install a test tracing subscriber once; later calls are no-ops.
///
/// Honors `RUST_LOG`, defaulting to `debug` for the console crates.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ziti_console_core=debug,ziti_console_client=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

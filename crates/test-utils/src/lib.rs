//! Shared fixtures for drawbot's integration tests.
//!
//! - [`builders`]: `ConfigFile` builder and geometry helpers.
//! - [`recording`]: listeners and sinks that record every call.
//! - [`fake_serial`]: a scripted controller board behind `SerialConnector`.

pub mod builders;
pub mod fake_serial;
pub mod recording;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a test subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows for failing tests.
/// `RUST_LOG=trace` includes the serial conversation.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than `limit`.
pub async fn within<F, T>(limit: Duration, f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, f).await {
        Ok(v) => v,
        Err(_) => panic!("test future did not finish within {limit:?}"),
    }
}

/// [`within`] with the default five second limit.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    within(Duration::from_secs(5), f).await
}

//! Shared fixtures for rebundle's integration tests: config builders, an
//! executor that completes tasks without running them, and harness helpers.

pub mod builders;
pub mod fake_executor;

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Install a subscriber for the scheduler, bundler and watch logs of a
/// test binary. Safe to call from every test.
///
/// Output is captured per test and shown only when it fails. `RUST_LOG`
/// overrides the `info` default, e.g. `RUST_LOG=rebundle::bundle=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than five seconds. Used
/// for rebuild notices and runtime exits that a bug would leave hanging.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("test timed out after 5 seconds")
}

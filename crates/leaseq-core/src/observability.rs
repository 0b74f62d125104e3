//! Logging setup shared by the binaries and integration tests.

use tracing_subscriber::EnvFilter;

/// Default directive when neither `filter` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "info";

/// Install a fmt subscriber. `filter` wins over `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

//! Tracing setup shared by every binary

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, honoring `RUST_LOG` when set
///
/// A second call keeps the subscriber already installed.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

use tracing_subscriber::EnvFilter;

/// Installs the JSON subscriber. `RUST_LOG` wins over `default_filter`.
/// A second call keeps the subscriber that is already installed.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(event = "tracing.init", filter = default_filter);
    }
}

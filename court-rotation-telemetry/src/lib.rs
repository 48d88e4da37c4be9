use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Used when neither `RUST_LOG` nor the configuration name a filter.
pub const DEFAULT_LOG_LEVEL: &str = "info,hyper=info,court_rotation_engine=debug";

/// `RUST_LOG` if set and valid, otherwise `default_filter`, otherwise [`DEFAULT_LOG_LEVEL`].
#[must_use]
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Installs the global subscriber. Calling it again is harmless, the first one wins.
pub fn setup_telemetry(default_filter: &str) {
    let stdout_log = tracing_subscriber::fmt::layer().with_target(true);

    let result = tracing_subscriber::registry()
        .with(stdout_log.with_filter(env_filter(default_filter)))
        .try_init();
    if result.is_ok() {
        tracing::debug!("telemetry initialized");
    }
}

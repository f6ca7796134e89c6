use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Installs the global `fmt` subscriber, filtered by [`env_filter`].
///
/// Uses `try_init`, so a second call (tests, an embedding application that
/// already set a subscriber) leaves the existing one in place.
pub fn init(settings: &LoggingSettings) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(settings))
        .with_target(false)
        .try_init();
}

/// `RUST_LOG` when it is set and parses, otherwise `logging.level` from the
/// settings, otherwise `info`.
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{DemoSettings, LoggingSettings, QueueSettings, Settings};

/// Prefix for environment overrides, e.g. `OPENMQ_QUEUE__LOG_PATH`.
pub const ENV_PREFIX: &str = "OPENMQ";

/// Loads the configuration from `.env`, the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the queue, logging and demo configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    // a missing .env is the normal case
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_over(Settings::default()))
}

#[cfg(test)]
mod tests;

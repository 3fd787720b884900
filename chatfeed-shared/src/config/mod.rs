//! # Configuration
//!
//! Settings for the chatfeed binary: logging and channel feed sizing.
//! Values are resolved from defaults, then an optional YAML or JSON file,
//! then `CHATFEED_*` environment variables, then command-line overrides.

pub mod feed;
pub mod logging;

pub use feed::FeedConfig;
pub use logging::{LogFormat, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::{env, error::Error, fs, path::PathBuf};

/// Error type returned by configuration loading.
pub type ConfigError = Box<dyn Error + Send + Sync>;

/// The main configuration structure for chatfeed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Logging settings
    pub logging: LoggingConfig,

    /// Channel feed settings
    pub feed: FeedConfig,
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a `.yaml`/`.yml` or `.json` file.
    /// * `history_override` - Optional window size taking precedence over everything else.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// variable holds an unparsable value, or the result fails [`Config::validate`].
    pub fn load_config(
        config_path: Option<PathBuf>,
        history_override: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::with_defaults();

        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            config = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                _ => return Err("Unsupported configuration format. Use 'yaml' or 'json'.".into()),
            };
        }

        // Environment only fills values the file left at their defaults.
        let defaults = Config::with_defaults();
        if config.logging.level == defaults.logging.level {
            if let Ok(level) = env::var("CHATFEED_LOG_LEVEL") {
                config.logging.level = level;
            }
        }
        if config.logging.format == defaults.logging.format {
            if let Ok(format) = env::var("CHATFEED_LOG_FORMAT") {
                config.logging.format = format.parse()?;
            }
        }
        if config.feed.history_size == defaults.feed.history_size {
            if let Ok(size) = env::var("CHATFEED_HISTORY_SIZE") {
                config.feed.history_size = size.parse().map_err(|_| {
                    "Invalid CHATFEED_HISTORY_SIZE value: must be a positive integer"
                })?;
            }
        }
        if config.feed.live_buffer == defaults.feed.live_buffer {
            if let Ok(size) = env::var("CHATFEED_LIVE_BUFFER") {
                config.feed.live_buffer = size.parse().map_err(|_| {
                    "Invalid CHATFEED_LIVE_BUFFER value: must be a positive integer"
                })?;
            }
        }

        if let Some(history_size) = history_override {
            config.feed.history_size = history_size;
        }

        config.validate().map_err(|errors| errors.join("; "))?;

        Ok(config)
    }

    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns every problem found, one message per invalid setting.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.feed.history_size == 0 {
            errors.push("Invalid feed.history_size. Must be greater than 0.".to_string());
        }
        if self.feed.live_buffer == 0 {
            errors.push("Invalid feed.live_buffer. Must be greater than 0.".to_string());
        }
        if self.logging.level.trim().is_empty() {
            errors.push("Invalid logging.level. Must not be empty.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

//! Engine configuration.
//!
//! Defaults are hardcoded; each can be overridden from the environment
//! (a `.env` file is honoured by the binary through `dotenvy`).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `INTEGRATOR_LOCALE` | `en_US` |
//! | `INTEGRATOR_TIMEZONE` | `UTC` |
//! | `INTEGRATOR_LOG` | `info` |

use std::env;

use chrono_tz::Tz;

use crate::error::ConfigError;

/// Locale restored after every formula evaluation.
pub const DEFAULT_LOCALE: &str = "en_US";

/// Timezone restored after every formula evaluation.
pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// Default `tracing` filter for the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime configuration of an execution.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Locale used outside of formula evaluation.
    pub default_locale: String,
    /// Timezone used outside of formula evaluation.
    pub default_time_zone: String,
    /// `tracing-subscriber` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_locale: DEFAULT_LOCALE.to_string(),
            default_time_zone: DEFAULT_TIME_ZONE.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(locale) = env::var("INTEGRATOR_LOCALE") {
            if locale.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: "INTEGRATOR_LOCALE",
                    message: "must not be empty".to_string(),
                });
            }
            config.default_locale = locale.trim().to_string();
        }

        if let Ok(time_zone) = env::var("INTEGRATOR_TIMEZONE") {
            let time_zone = time_zone.trim().to_string();
            time_zone
                .parse::<Tz>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: "INTEGRATOR_TIMEZONE",
                    message: e.to_string(),
                })?;
            config.default_time_zone = time_zone;
        }

        if let Ok(filter) = env::var("INTEGRATOR_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

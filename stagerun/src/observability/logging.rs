//! `tracing-subscriber` initialisation.

use crate::errors::StagerunError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Settings for the global `tracing` subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set (e.g. `"stagerun=debug"`).
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Sets the fallback filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Switches JSON output on or off.
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, StagerunError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.filter)
                .map_err(|e| StagerunError::Config(format!("invalid log filter: {e}"))),
        }
    }
}

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingConfig::filter`].
///
/// # Errors
///
/// Returns [`StagerunError::Config`] if the filter cannot be parsed or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), StagerunError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| StagerunError::Config(format!("failed to install subscriber: {e}")))
}

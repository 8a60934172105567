//! Executor configuration.

use crate::errors::StagerunError;
use serde::{Deserialize, Serialize};

/// Configuration for an [`crate::pipeline::Executor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Label of the run, attached to every log line the run emits.
    pub name: String,
    /// Emit a `debug!` event for every stage state change.
    pub trace_transitions: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "stagerun".to_string(),
            trace_transitions: true,
        }
    }
}

impl ExecutorConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables per-transition trace events.
    #[must_use]
    pub const fn with_trace_transitions(mut self, enabled: bool) -> Self {
        self.trace_transitions = enabled;
        self
    }

    /// Parses a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StagerunError::Config`] if the JSON is malformed or the
    /// name is empty.
    pub fn from_json_str(json: &str) -> Result<Self, StagerunError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| StagerunError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns [`StagerunError::Config`] if the name is empty or whitespace-only.
    pub fn validate(&self) -> Result<(), StagerunError> {
        if self.name.trim().is_empty() {
            return Err(StagerunError::Config(
                "executor name cannot be empty or whitespace-only".to_string(),
            ));
        }
        Ok(())
    }
}

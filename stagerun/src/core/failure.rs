//! Recorded stage failures.

use super::StageName;
use std::fmt;
use std::sync::Arc;

/// An error returned by a stage action, tagged with the stage that produced it.
#[derive(Debug, Clone)]
pub struct StageFailure {
    /// The failing stage.
    pub stage: StageName,
    /// The error the action returned.
    pub error: Arc<anyhow::Error>,
}

impl StageFailure {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stage: impl Into<StageName>, error: Arc<anyhow::Error>) -> Self {
        Self {
            stage: stage.into(),
            error,
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage '{}' failed: {:#}", self.stage, self.error)
    }
}

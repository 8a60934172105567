//! Change callback type and helpers.

use crate::core::{StageName, StageState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

/// Callback invoked on every stage state change.
///
/// Arguments are the stage name, its new state and, for a stage that reached
/// [`StageState::Done`] with a failure, the error its action returned.
pub type ChangeCallback =
    Arc<dyn Fn(&StageName, StageState, Option<&anyhow::Error>) + Send + Sync>;

/// Returns a callback that discards every change.
#[must_use]
pub fn noop_callback() -> ChangeCallback {
    Arc::new(|_, _, _| {})
}

/// Returns a callback that reports changes through `tracing`.
///
/// Changes carrying an error are always logged at `WARN`.
#[must_use]
pub fn logging_callback(level: Level) -> ChangeCallback {
    Arc::new(move |stage, state, error| {
        if let Some(error) = error {
            warn!(stage = %stage, state = %state, error = %error, "Stage changed with error");
            return;
        }
        match level {
            Level::DEBUG | Level::TRACE => {
                debug!(stage = %stage, state = %state, "Stage changed");
            }
            _ => {
                info!(stage = %stage, state = %state, "Stage changed");
            }
        }
    })
}

/// An owned record of a single state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    /// The stage that changed.
    pub stage: StageName,
    /// The state it moved to.
    pub state: StageState,
    /// The action's error message, if the change carried one.
    pub error: Option<String>,
    /// When the change was observed.
    pub at: DateTime<Utc>,
}

impl StageChange {
    /// Captures a change as delivered to a [`ChangeCallback`].
    #[must_use]
    pub fn capture(stage: &StageName, state: StageState, error: Option<&anyhow::Error>) -> Self {
        Self {
            stage: stage.clone(),
            state,
            error: error.map(ToString::to_string),
            at: Utc::now(),
        }
    }
}

//! Stage state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a stage within a run.
///
/// Valid transitions are `Runnable -> Running -> Done` and
/// `Runnable -> Skipped`. `Done` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Declared and waiting for its dependencies.
    #[default]
    Runnable,
    /// The action has been launched.
    Running,
    /// The action finished, with or without an error.
    Done,
    /// The stage will never run because an upstream stage failed, was
    /// skipped, or the run was cancelled.
    Skipped,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runnable => write!(f, "runnable"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageState {
    /// Returns true if the state can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Runnable, Self::Running | Self::Skipped) | (Self::Running, Self::Done)
        )
    }
}

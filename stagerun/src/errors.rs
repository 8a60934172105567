//! Error types for the stagerun executor.
//!
//! Graph construction errors and run lifecycle errors live here. Failures
//! returned by stage actions are plain [`anyhow::Error`] values and never
//! become a [`StagerunError`]: they stay attached to the stage that produced
//! them (see [`crate::core::StageFailure`]).

use crate::core::StageName;
use thiserror::Error;

/// The main error type for stagerun operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StagerunError {
    /// A stage with the same name is already registered.
    #[error("Stage '{stage}' is already declared")]
    DuplicateStage {
        /// The duplicated stage name.
        stage: StageName,
    },

    /// A stage lists itself among its dependencies.
    #[error("Stage '{stage}' cannot depend on itself")]
    SelfDependency {
        /// The offending stage.
        stage: StageName,
    },

    /// A dependency is neither `start` nor an already declared stage.
    #[error("Stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency {
        /// The stage being declared.
        stage: StageName,
        /// The dependency that could not be resolved.
        dependency: StageName,
    },

    /// A reserved identifier was used as a regular stage name.
    #[error("Stage name '{stage}' is reserved")]
    ReservedName {
        /// The reserved name.
        stage: StageName,
    },

    /// A stage was declared with an empty dependency list.
    #[error("Stage '{stage}' has no dependencies; use 'start' for root stages")]
    MissingDependencies {
        /// The offending stage.
        stage: StageName,
    },

    /// The run was started without a terminal stage.
    #[error("End stage is not specified")]
    EndStageNotSpecified,

    /// `start` was called on an executor that already ran.
    #[error("Executor was already started")]
    AlreadyStarted,

    /// `wait` was called before `start`.
    #[error("Executor was not started")]
    NotStarted,

    /// The executor configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StagerunError {
    /// Returns a stable, machine-readable code for the error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateStage { .. } => "GRAPH-DUPLICATE",
            Self::SelfDependency { .. } => "GRAPH-SELF_DEP",
            Self::UnknownDependency { .. } => "GRAPH-MISSING_DEP",
            Self::ReservedName { .. } => "GRAPH-RESERVED",
            Self::MissingDependencies { .. } => "GRAPH-NO_DEPS",
            Self::EndStageNotSpecified => "RUN-NO_END",
            Self::AlreadyStarted => "RUN-ALREADY_STARTED",
            Self::NotStarted => "RUN-NOT_STARTED",
            Self::Config(_) => "CONFIG",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Returns true for errors raised while building the stage graph.
    ///
    /// These indicate a bug in the caller's graph construction rather than a
    /// runtime condition.
    #[must_use]
    pub const fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateStage { .. }
                | Self::SelfDependency { .. }
                | Self::UnknownDependency { .. }
                | Self::ReservedName { .. }
                | Self::MissingDependencies { .. }
        )
    }

    /// Returns a short hint for fixing the error, if one applies.
    #[must_use]
    pub const fn fix_hint(&self) -> Option<&'static str> {
        match self {
            Self::DuplicateStage { .. } => Some("Give every stage a unique name."),
            Self::UnknownDependency { .. } => {
                Some("Declare the dependency before the stage that depends on it.")
            }
            Self::EndStageNotSpecified => {
                Some("Call set_terminal with the leaf stages before starting the run.")
            }
            Self::MissingDependencies { .. } => {
                Some("Root stages must depend on 'start'.")
            }
            _ => None,
        }
    }
}

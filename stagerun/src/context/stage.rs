//! The context handed to a stage action at launch.

use crate::cancellation::CancellationToken;
use crate::core::StageName;
use std::sync::Arc;

/// Context passed to every stage action.
///
/// Carries the name the action is running as and the run's cancellation
/// token. The finalizer receives a context named [`StageName::FINAL`].
#[derive(Debug, Clone)]
pub struct StageContext {
    stage: StageName,
    token: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(stage: impl Into<StageName>, token: Arc<CancellationToken>) -> Self {
        Self {
            stage: stage.into(),
            token,
        }
    }

    /// Returns the name of the stage being executed.
    #[must_use]
    pub fn stage_name(&self) -> &StageName {
        &self.stage
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Returns true if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the run is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns true if this context belongs to the finalizer.
    #[must_use]
    pub fn is_finalizer(&self) -> bool {
        self.stage == StageName::FINAL
    }
}

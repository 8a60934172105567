//! Stage action trait and implementations.
//!
//! A stage action is the unit of work behind a declared stage. Any async
//! closure taking a [`StageContext`] and returning a [`StageResult`] is an
//! action; types that need more state can implement [`StageAction`] directly.

use crate::context::StageContext;
use async_trait::async_trait;
use std::future::Future;

/// The outcome of a stage action.
pub type StageResult = anyhow::Result<()>;

/// Trait for stage actions.
///
/// Errors returned from [`StageAction::run`] are recorded against the stage,
/// reported through the change callback and cause every dependent stage to
/// be skipped. They never abort the run itself.
#[async_trait]
pub trait StageAction: Send + Sync {
    /// Runs the action.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Carries the stage name and the run's cancellation token
    async fn run(&self, ctx: StageContext) -> StageResult;
}

#[async_trait]
impl<F, Fut> StageAction for F
where
    F: Fn(StageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    async fn run(&self, ctx: StageContext) -> StageResult {
        (self)(ctx).await
    }
}

/// An action that does nothing and always succeeds.
///
/// Used as the body of the terminal stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAction;

#[async_trait]
impl StageAction for NoOpAction {
    async fn run(&self, _ctx: StageContext) -> StageResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;

    fn test_context(name: &str) -> StageContext {
        StageContext::new(name, CancellationToken::shared())
    }

    #[tokio::test]
    async fn test_closure_action() {
        let action = |ctx: StageContext| async move {
            assert_eq!(ctx.stage_name(), "load");
            anyhow::Ok(())
        };

        assert!(action.run(test_context("load")).await.is_ok());
    }

    #[tokio::test]
    async fn test_closure_action_error() {
        let action = |_ctx: StageContext| async move { Err::<(), _>(anyhow::anyhow!("boom")) };

        let err = action.run(test_context("load")).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_noop_action() {
        assert!(NoOpAction.run(test_context("end")).await.is_ok());
    }
}

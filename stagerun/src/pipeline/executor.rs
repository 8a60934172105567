//! Public executor handle.

use super::dag::RunState;
use super::StageSpec;
use crate::cancellation::CancellationToken;
use crate::config::ExecutorConfig;
use crate::core::{StageFailure, StageName, StageState};
use crate::errors::StagerunError;
use crate::stages::{NoOpAction, StageAction};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Runs a graph of named stages, launching each one as soon as all of its
/// dependencies have finished successfully.
///
/// Declare the graph first, then [`start`](Self::start) it exactly once:
///
/// ```rust,no_run
/// use stagerun::prelude::*;
///
/// # async fn demo() -> Result<(), StagerunError> {
/// let mut executor = Executor::new();
/// executor
///     .declare("load", |_ctx: StageContext| async move { anyhow::Ok(()) }, [StageName::START])
///     .declare("report", |_ctx: StageContext| async move { anyhow::Ok(()) }, ["load"])
///     .set_terminal(["report"]);
///
/// executor.start(CancellationToken::shared())?;
/// executor.wait().await?;
/// assert!(executor.errors().is_empty());
/// # Ok(())
/// # }
/// ```
///
/// A failing stage does not fail the run. Its error is recorded, reported
/// through [`on_change`](Self::on_change) and returned by
/// [`errors`](Self::errors), and every stage that depends on it, directly or
/// transitively, is skipped.
pub struct Executor {
    state: Arc<RunState>,
    done_rx: watch::Receiver<bool>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an executor with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Creates an executor with the given configuration.
    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        let (state, done_rx) = RunState::new(config);
        Self { state, done_rx }
    }

    /// Returns the executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.state.config
    }

    /// Registers the change callback, replacing any previous one.
    ///
    /// The callback is invoked synchronously while the executor holds its
    /// internal lock. It must not block and must not call the executor.
    pub fn on_change<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&StageName, StageState, Option<&anyhow::Error>) + Send + Sync + 'static,
    {
        *self.state.on_change.write() = Arc::new(callback);
        self
    }

    /// Declares a stage.
    ///
    /// # Panics
    ///
    /// Panics on any error [`try_declare`](Self::try_declare) would return.
    /// These are bugs in graph construction, not runtime conditions.
    pub fn declare<A>(
        &mut self,
        name: impl Into<StageName>,
        action: A,
        dependencies: impl IntoIterator<Item = impl Into<StageName>>,
    ) -> &mut Self
    where
        A: StageAction + 'static,
    {
        if let Err(err) = self.try_declare(name, action, dependencies) {
            graph_bug(&err);
        }
        self
    }

    /// Declares a stage that does nothing.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`declare`](Self::declare).
    pub fn declare_noop(
        &mut self,
        name: impl Into<StageName>,
        dependencies: impl IntoIterator<Item = impl Into<StageName>>,
    ) -> &mut Self {
        self.declare(name, NoOpAction, dependencies)
    }

    /// Declares a stage, returning graph errors instead of panicking.
    ///
    /// Fires the change callback with the new stage in
    /// [`StageState::Runnable`].
    ///
    /// # Errors
    ///
    /// - [`StagerunError::ReservedName`] for `start`, `end` or `final`
    /// - [`StagerunError::DuplicateStage`] if the name is taken
    /// - [`StagerunError::SelfDependency`] if the stage depends on itself
    /// - [`StagerunError::MissingDependencies`] if `dependencies` is empty
    /// - [`StagerunError::UnknownDependency`] for a dependency that is
    ///   neither `start` nor already declared
    /// - [`StagerunError::AlreadyStarted`] once the run has started
    pub fn try_declare<A>(
        &mut self,
        name: impl Into<StageName>,
        action: A,
        dependencies: impl IntoIterator<Item = impl Into<StageName>>,
    ) -> Result<&mut Self, StagerunError>
    where
        A: StageAction + 'static,
    {
        self.ensure_not_started()?;
        let spec = StageSpec::new(name, Arc::new(action), dependencies);
        let name = spec.name.clone();
        self.state.registry.lock().declare(spec)?;
        self.state.notify(&name, StageState::Runnable, None);
        Ok(self)
    }

    /// Declares the terminal stage, replacing any earlier declaration.
    ///
    /// `dependencies` are the graph's leaf stages; pass `start` alone for an
    /// empty graph.
    ///
    /// # Panics
    ///
    /// Panics on any error [`try_set_terminal`](Self::try_set_terminal) would return.
    pub fn set_terminal(
        &mut self,
        dependencies: impl IntoIterator<Item = impl Into<StageName>>,
    ) -> &mut Self {
        if let Err(err) = self.try_set_terminal(dependencies) {
            graph_bug(&err);
        }
        self
    }

    /// Declares the terminal stage, returning graph errors instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns an error if `dependencies` is empty or names an undeclared
    /// stage, or if the run has started.
    pub fn try_set_terminal(
        &mut self,
        dependencies: impl IntoIterator<Item = impl Into<StageName>>,
    ) -> Result<&mut Self, StagerunError> {
        self.ensure_not_started()?;
        self.state.registry.lock().set_terminal(dependencies)?;
        self.state.notify(&StageName::end(), StageState::Runnable, None);
        Ok(self)
    }

    /// Sets the action run once after the graph finishes, whatever the
    /// outcome. The latest call wins.
    ///
    /// The finalizer's context is named [`StageName::FINAL`]. Its error is not
    /// part of [`errors`](Self::errors); see
    /// [`finalizer_error`](Self::finalizer_error).
    pub fn set_finalizer<A>(&mut self, action: A) -> &mut Self
    where
        A: StageAction + 'static,
    {
        *self.state.finalizer.lock() = Some(Arc::new(action));
        self
    }

    /// Starts the run on the current tokio runtime.
    ///
    /// Returns as soon as the control task is spawned; use
    /// [`wait`](Self::wait) to block until the run is over. Cancelling
    /// `token` stops new stages from launching and skips every stage that
    /// has not started yet. Cancellation is not reported as an error.
    ///
    /// # Errors
    ///
    /// - [`StagerunError::AlreadyStarted`] if called twice
    /// - [`StagerunError::EndStageNotSpecified`] without a terminal stage;
    ///   nothing is launched and the executor can still be started later
    /// - [`StagerunError::Internal`] outside a tokio runtime
    pub fn start(&self, token: Arc<CancellationToken>) -> Result<(), StagerunError> {
        self.ensure_not_started()?;
        if !self.state.registry.lock().has_end() {
            return Err(StagerunError::EndStageNotSpecified);
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| StagerunError::Internal(format!("no tokio runtime: {e}")))?;

        if self
            .state
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StagerunError::AlreadyStarted);
        }

        self.state.registry.lock().mark_satisfied(StageName::start());

        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let span = info_span!(
            "stagerun.run",
            run = %self.state.config.name,
            run_id = %Uuid::new_v4(),
        );
        handle.spawn(
            Arc::clone(&self.state)
                .run_loop(token, done_rx, done_tx)
                .instrument(span),
        );
        Ok(())
    }

    /// Waits until the run, including the finalizer, has finished.
    ///
    /// # Errors
    ///
    /// Returns [`StagerunError::NotStarted`] immediately if the run was never
    /// started.
    pub async fn wait(&self) -> Result<(), StagerunError> {
        if !self.state.is_started() {
            return Err(StagerunError::NotStarted);
        }
        let mut done_rx = self.done_rx.clone();
        done_rx
            .wait_for(|done| *done)
            .await
            .map_err(|_| StagerunError::Internal("run state dropped".to_string()))?;
        Ok(())
    }

    /// Blocks the current thread until the run has finished.
    ///
    /// Must not be called from inside an async task; use
    /// [`wait`](Self::wait) there.
    ///
    /// # Errors
    ///
    /// Same as [`wait`](Self::wait).
    pub fn wait_blocking(&self) -> Result<(), StagerunError> {
        futures::executor::block_on(self.wait())
    }

    /// Every error recorded by a stage action, in declaration order.
    #[must_use]
    pub fn errors(&self) -> Vec<StageFailure> {
        self.state.registry.lock().errors()
    }

    /// The finalizer's error, if it returned one.
    #[must_use]
    pub fn finalizer_error(&self) -> Option<Arc<anyhow::Error>> {
        self.state.finalizer_error.lock().clone()
    }

    /// Returns true once the scheduling loop and the finalizer have finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Returns true once [`start`](Self::start) has succeeded.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.is_started()
    }

    /// Current state of a stage, or `None` if it is not declared.
    #[must_use]
    pub fn state_of(&self, name: &str) -> Option<StageState> {
        self.state.registry.lock().get(name).map(|spec| spec.state)
    }

    /// Snapshot of every stage's state in declaration order, `end` last.
    #[must_use]
    pub fn states(&self) -> Vec<(StageName, StageState)> {
        self.state.registry.lock().states()
    }

    fn ensure_not_started(&self) -> Result<(), StagerunError> {
        if self.state.is_started() {
            return Err(StagerunError::AlreadyStarted);
        }
        Ok(())
    }
}

/// Aborts graph construction, appending the error's fix hint if it has one.
#[allow(clippy::panic)]
fn graph_bug(err: &StagerunError) -> ! {
    match err.fix_hint() {
        Some(hint) => panic!("{err}. {hint}"),
        None => panic!("{err}"),
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.state.config)
            .field("stages", &self.state.registry.lock().len())
            .field("started", &self.is_started())
            .field("done", &self.is_done())
            .finish()
    }
}

//! Scheduling loop.
//!
//! One control task per run owns the completion receiver and rescans the
//! registry whenever a stage finishes. Every scan, every stage completion and
//! the cancellation sweep take the same registry lock, so no two of them can
//! race on a stage's transition.

use super::registry::{Readiness, Registry};
use crate::cancellation::CancellationToken;
use crate::config::ExecutorConfig;
use crate::context::StageContext;
use crate::core::{StageName, StageState};
use crate::events::{noop_callback, ChangeCallback};
use crate::stages::{StageAction, StageResult};
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn, Instrument};

/// Result of one pass over the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanOutcome {
    /// Stages moved to `Running` by this pass.
    pub launched: usize,
    /// Stages moved to `Skipped` by this pass.
    pub skipped: usize,
    /// Stages still `Running` after the pass.
    pub running: usize,
    /// Every stage is `Done` or `Skipped`.
    pub finished: bool,
}

/// State shared between the executor handle, the control task and every
/// launched stage.
pub(crate) struct RunState {
    pub(crate) config: ExecutorConfig,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) on_change: RwLock<ChangeCallback>,
    pub(crate) finalizer: Mutex<Option<Arc<dyn StageAction>>>,
    pub(crate) finalizer_error: Mutex<Option<Arc<anyhow::Error>>>,
    pub(crate) started: AtomicBool,
    pub(crate) done: AtomicBool,
    done_tx: watch::Sender<bool>,
}

impl RunState {
    pub(crate) fn new(config: ExecutorConfig) -> (Arc<Self>, watch::Receiver<bool>) {
        let (done_tx, done_rx) = watch::channel(false);
        let state = Arc::new(Self {
            config,
            registry: Mutex::new(Registry::new()),
            on_change: RwLock::new(noop_callback()),
            finalizer: Mutex::new(None),
            finalizer_error: Mutex::new(None),
            started: AtomicBool::new(false),
            done: AtomicBool::new(false),
            done_tx,
        });
        (state, done_rx)
    }

    /// Reports a state change to the tracing layer and the change callback.
    ///
    /// A panicking callback is logged and otherwise ignored; it must not take
    /// down the control task or a stage task mid-transition.
    pub(crate) fn notify(&self, stage: &StageName, state: StageState, err: Option<&anyhow::Error>) {
        if self.config.trace_transitions {
            debug!(stage = %stage, state = %state, failed = err.is_some(), "Stage transition");
        }
        let callback = Arc::clone(&*self.on_change.read());
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback(stage, state, err)));
        if let Err(panic) = outcome {
            warn!(stage = %stage, state = %state, "Change callback panicked: {:?}", panic);
        }
    }

    /// Drives the run to completion, then runs the finalizer.
    pub(crate) async fn run_loop(
        self: Arc<Self>,
        token: Arc<CancellationToken>,
        mut done_rx: mpsc::UnboundedReceiver<StageName>,
        done_tx: mpsc::UnboundedSender<StageName>,
    ) {
        info!(stages = self.registry.lock().len(), "Run started");

        loop {
            if token.is_cancelled() {
                self.sweep(&token);
                break;
            }

            let outcome = self.scan(&token, &done_tx);
            if outcome.finished {
                break;
            }
            if outcome.skipped > 0 {
                continue;
            }
            if outcome.running == 0 {
                error!("No stage is running but the graph is incomplete");
                self.sweep(&token);
                break;
            }

            tokio::select! {
                biased;
                () = token.cancelled() => {}
                // Only a wake-up: `complete` already recorded the outcome.
                Some(name) = done_rx.recv() => {
                    if self.config.trace_transitions {
                        debug!(stage = %name, "Completion received");
                    }
                }
            }
        }

        self.run_finalizer(&token).await;
        self.finish();
    }

    /// One pass over the registry in declaration order.
    pub(crate) fn scan(
        self: &Arc<Self>,
        token: &Arc<CancellationToken>,
        done_tx: &mpsc::UnboundedSender<StageName>,
    ) -> ScanOutcome {
        let mut registry = self.registry.lock();
        let mut outcome = ScanOutcome::default();

        for position in 0..registry.len() {
            let Some(spec) = registry.slot(position) else {
                break;
            };
            if spec.state != StageState::Runnable {
                continue;
            }

            match registry.readiness(spec) {
                Readiness::Waiting => {}
                Readiness::Blocked => {
                    let Some(spec) = registry.slot_mut(position) else {
                        continue;
                    };
                    spec.transition(StageState::Skipped);
                    let name = spec.name.clone();
                    self.notify(&name, StageState::Skipped, None);
                    outcome.skipped += 1;
                }
                Readiness::Ready => {
                    let Some(spec) = registry.slot_mut(position) else {
                        continue;
                    };
                    spec.transition(StageState::Running);
                    let name = spec.name.clone();
                    let action = Arc::clone(&spec.action);
                    self.notify(&name, StageState::Running, None);
                    self.launch(name, action, token, done_tx);
                    outcome.launched += 1;
                }
            }
        }

        outcome.running = registry.count_in(StageState::Running);
        outcome.finished = registry.all_terminal();
        outcome
    }

    /// Spawns the action of a stage that just became `Running`.
    fn launch(
        self: &Arc<Self>,
        name: StageName,
        action: Arc<dyn StageAction>,
        token: &Arc<CancellationToken>,
        done_tx: &mpsc::UnboundedSender<StageName>,
    ) {
        let state = Arc::clone(self);
        let ctx = StageContext::new(name.clone(), Arc::clone(token));
        let done_tx = done_tx.clone();

        tokio::spawn(
            async move {
                let result = run_action(action, ctx).await;
                state.complete(&name, result);
                // The control task is gone once the run was cancelled.
                let _ = done_tx.send(name);
            }
            .in_current_span(),
        );
    }

    /// Records the outcome of a finished action.
    ///
    /// Failures still move the stage to `Done`; dependents see the recorded
    /// error on the next scan and are skipped. A success satisfies the stage
    /// under the same lock, so a scan never sees it `Done` but unsatisfied.
    pub(crate) fn complete(&self, name: &StageName, result: StageResult) {
        let mut registry = self.registry.lock();
        let Some(spec) = registry.get_mut(name.as_str()) else {
            error!(stage = %name, "Completed stage is not registered");
            return;
        };

        spec.transition(StageState::Done);
        if let Err(err) = result {
            warn!(stage = %name, error = %err, "Stage failed");
            spec.last_error = Some(Arc::new(err));
        }
        let last_error = spec.last_error.clone();
        if last_error.is_none() {
            registry.mark_satisfied(name.clone());
        }
        self.notify(name, StageState::Done, last_error.as_deref());
    }

    /// Skips every stage that is still `Runnable`.
    ///
    /// Runs under a single lock acquisition, so the set of skipped stages is
    /// the set that was runnable at that instant. Stages already `Running`
    /// are left to finish on their own and will record `Done` whenever they
    /// complete, but nothing new is launched afterwards.
    pub(crate) fn sweep(&self, token: &CancellationToken) -> usize {
        let mut registry = self.registry.lock();
        let mut skipped = 0;

        for position in 0..registry.len() {
            let Some(spec) = registry.slot_mut(position) else {
                break;
            };
            if spec.state != StageState::Runnable {
                continue;
            }
            spec.transition(StageState::Skipped);
            let name = spec.name.clone();
            self.notify(&name, StageState::Skipped, None);
            skipped += 1;
        }

        let in_flight = registry.count_in(StageState::Running);
        warn!(
            reason = token.reason().as_deref().unwrap_or("unknown"),
            skipped,
            in_flight,
            "Run cancelled"
        );
        skipped
    }

    async fn run_finalizer(&self, token: &Arc<CancellationToken>) {
        let finalizer = self.finalizer.lock().clone();
        let Some(finalizer) = finalizer else {
            return;
        };

        let ctx = StageContext::new(StageName::final_tag(), Arc::clone(token));
        if let Err(err) = run_action(finalizer, ctx).await {
            warn!(error = %err, "Finalizer failed");
            *self.finalizer_error.lock() = Some(Arc::new(err));
        }
    }

    fn finish(&self) {
        let failures = self.registry.lock().errors().len();
        self.done.store(true, Ordering::SeqCst);
        self.done_tx.send_replace(true);
        info!(failures, "Run finished");
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Runs an action on its own task so a panic is reported as a failure
/// instead of tearing down the caller.
async fn run_action(action: Arc<dyn StageAction>, ctx: StageContext) -> StageResult {
    let stage = ctx.stage_name().clone();
    match tokio::spawn(async move { action.run(ctx).await }.in_current_span()).await {
        Ok(result) => result,
        Err(join_err) => {
            error!(stage = %stage, error = %join_err, "Stage action panicked");
            Err(anyhow::anyhow!("stage '{stage}' panicked: {join_err}"))
        }
    }
}

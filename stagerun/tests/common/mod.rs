//! Shared helpers for executor integration tests.

#![allow(dead_code)]

use stagerun::prelude::*;
use stagerun::testing::VisitRecorder;
use std::time::Duration;

/// An action that sleeps, then records its own stage name.
pub fn sleep_then_record(recorder: &VisitRecorder, sleep: Duration) -> impl StageAction {
    let recorder = recorder.clone();
    move |ctx: StageContext| {
        let recorder = recorder.clone();
        async move {
            tokio::time::sleep(sleep).await;
            recorder.record(ctx.stage_name());
            anyhow::Ok(())
        }
    }
}

/// An action that records its own stage name and succeeds.
pub fn record(recorder: &VisitRecorder) -> impl StageAction {
    sleep_then_record(recorder, Duration::ZERO)
}

/// An action that records its own stage name, then fails.
pub fn record_and_fail(recorder: &VisitRecorder, message: &'static str) -> impl StageAction {
    let recorder = recorder.clone();
    move |ctx: StageContext| {
        let recorder = recorder.clone();
        async move {
            recorder.record(ctx.stage_name());
            Err::<(), _>(anyhow::anyhow!(message))
        }
    }
}

/// An action that succeeds immediately.
pub fn ok() -> impl StageAction {
    |_ctx: StageContext| async move { anyhow::Ok(()) }
}

/// An action that fails immediately.
pub fn fail(message: &'static str) -> impl StageAction {
    move |_ctx: StageContext| async move { Err::<(), _>(anyhow::anyhow!(message)) }
}

/// Waits for the run, failing the test if it takes longer than `limit`.
pub async fn wait_within(executor: &Executor, limit: Duration) -> Result<(), StagerunError> {
    tokio::time::timeout(limit, executor.wait())
        .await
        .expect("run did not finish in time")
}

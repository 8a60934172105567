//! A small data pipeline with a failing branch and a deadline.
//!
//! ```text
//! start -> load -> filter -> aggregate-by-country ----> report -> end
//!                        \-> aggregate-by-age ---------/
//!                        \-> aggregate-by-plan (fails)  -> additional
//! ```
//!
//! Run with `cargo run --example basic`. Set `RUST_LOG=stagerun=debug` to
//! see every transition.

use stagerun::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

fn step(label: &'static str, millis: u64) -> impl StageAction {
    move |ctx: StageContext| async move {
        tokio::select! {
            () = ctx.cancelled() => anyhow::bail!("{label} interrupted"),
            () = tokio::time::sleep(Duration::from_millis(millis)) => {}
        }
        println!("  {:<22} finished {label}", ctx.stage_name().as_str());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&LoggingConfig::default())?;

    let config = ExecutorConfig::default().with_name("users-report");
    let log_change = logging_callback(Level::INFO);
    let mut executor = Executor::with_config(config);
    executor
        .on_change(move |stage, state, err| log_change(stage, state, err))
        .declare("load", step("loading users", 100), [StageName::START])
        .declare("filter", step("dropping inactive users", 50), ["load"])
        .declare("aggregate-by-country", step("grouping by country", 150), ["filter"])
        .declare("aggregate-by-age", step("grouping by age", 80), ["filter"])
        .declare(
            "aggregate-by-plan",
            |_ctx: StageContext| async move {
                Err::<(), _>(anyhow::anyhow!("plan table is unavailable"))
            },
            ["filter"],
        )
        .declare("report", step("rendering report", 60), ["aggregate-by-country", "aggregate-by-age"])
        .declare("additional", step("plan breakdown", 40), ["aggregate-by-plan"])
        .set_terminal(["report", "additional"])
        .set_finalizer(|_ctx: StageContext| async move {
            println!("  cleanup done");
            anyhow::Ok(())
        });

    let token = CancellationToken::shared();
    token.on_cancel(|| println!("  deadline hit, remaining stages will be skipped"));
    token.cancel_after(Duration::from_secs(2), "deadline exceeded");

    executor.start(Arc::clone(&token))?;
    executor.wait().await?;

    println!("\nstates:");
    for (stage, state) in executor.states() {
        println!("  {:<22} {state}", stage.as_str());
    }
    for failure in executor.errors() {
        println!("error: {failure}");
    }
    Ok(())
}

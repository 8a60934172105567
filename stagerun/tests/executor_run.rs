//! End-to-end behaviour of a run: ordering, failure propagation and the
//! finalizer.

mod common;

use common::{fail, ok, record, record_and_fail, sleep_then_record, wait_within};
use pretty_assertions::assert_eq;
use stagerun::prelude::*;
use stagerun::testing::{ChangeRecorder, VisitRecorder};
use std::time::Duration;

const LIMIT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_start_and_end_completes_immediately() {
    let mut executor = Executor::new();
    executor.set_terminal([StageName::START]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert!(executor.is_done());
    assert!(executor.errors().is_empty());
    assert_eq!(executor.state_of("end"), Some(StageState::Done));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_stage() {
    let mut executor = Executor::new();
    executor
        .declare("stage-1", ok(), [StageName::START])
        .set_terminal(["stage-1"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert!(executor.errors().is_empty());
    assert_eq!(executor.state_of("stage-1"), Some(StageState::Done));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn siblings_finish_by_duration_not_launch_order() {
    // start --> stage-1 --> stage-2-1 (slow) --> end
    //                  \--> stage-2-2 (fast) /
    let visits = VisitRecorder::new();
    let mut executor = Executor::new();
    executor
        .declare("stage-1", record(&visits), [StageName::START])
        .declare(
            "stage-2-1",
            sleep_then_record(&visits, Duration::from_millis(300)),
            ["stage-1"],
        )
        .declare("stage-2-2", record(&visits), ["stage-1"])
        .set_terminal(["stage-2-1", "stage-2-2"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert!(executor.errors().is_empty());
    assert_eq!(
        visits.snapshot(),
        vec![
            StageName::from("stage-1"),
            StageName::from("stage-2-2"),
            StageName::from("stage-2-1"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_out_fan_in_waits_for_both_branches() {
    // A --> {B, C} --> D
    let visits = VisitRecorder::new();
    let mut executor = Executor::new();
    executor
        .declare("A", record(&visits), [StageName::START])
        .declare("B", sleep_then_record(&visits, Duration::from_millis(50)), ["A"])
        .declare("C", sleep_then_record(&visits, Duration::from_millis(150)), ["A"])
        .declare("D", record(&visits), ["B", "C"])
        .set_terminal(["D"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert_eq!(visits.len(), 4);
    assert_eq!(visits.position("A"), Some(0));
    assert_eq!(visits.position("D"), Some(3));
    let b = visits.position("B").unwrap();
    let c = visits.position("C").unwrap();
    assert!(b < 3 && c < 3);

    for (name, state) in executor.states() {
        assert_eq!(state, StageState::Done, "stage {name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn join_does_not_start_before_slow_branch_reports() {
    let changes = ChangeRecorder::new();
    let mut executor = Executor::new();
    executor
        .on_change(changes.callback())
        .declare("A", ok(), [StageName::START])
        .declare(
            "B",
            |_ctx: StageContext| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                anyhow::Ok(())
            },
            ["A"],
        )
        .declare("C", ok(), ["A"])
        .declare("D", ok(), ["B", "C"])
        .set_terminal(["D"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    let log = changes.changes();
    let b_done = log
        .iter()
        .position(|c| c.stage == "B" && c.state == StageState::Done)
        .unwrap();
    let d_running = log
        .iter()
        .position(|c| c.stage == "D" && c.state == StageState::Running)
        .unwrap();
    assert!(b_done < d_running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_stage_failure_skips_everything_downstream() {
    // start --> stage-1 (fails) --> stage-2-1 --> end
    //                          \--> stage-2-2 /
    let visits = VisitRecorder::new();
    let mut executor = Executor::new();
    executor
        .declare("stage-1", record_and_fail(&visits, "fake error"), [StageName::START])
        .declare(
            "stage-2-1",
            sleep_then_record(&visits, Duration::from_millis(250)),
            ["stage-1"],
        )
        .declare("stage-2-2", record(&visits), ["stage-1"])
        .set_terminal(["stage-2-1", "stage-2-2"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    let errors = executor.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].stage, "stage-1");
    assert_eq!(errors[0].message(), "fake error");

    assert_eq!(visits.snapshot(), vec![StageName::from("stage-1")]);
    assert_eq!(
        executor.states(),
        vec![
            (StageName::from("stage-1"), StageState::Done),
            (StageName::from("stage-2-1"), StageState::Skipped),
            (StageName::from("stage-2-2"), StageState::Skipped),
            (StageName::end(), StageState::Skipped),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn change_stream_counts_for_mid_graph_failure() {
    //                              /--> stage-3-1 \
    // start --> stage-1 --> stage-2 --> stage-3-2  --> stage-4 --> end
    //                              \--> stage-3-3 /
    let changes = ChangeRecorder::new();
    let mut executor = Executor::new();
    executor
        .on_change(changes.callback())
        .declare("stage-1", ok(), [StageName::START])
        .declare("stage-2", fail("fake error"), ["stage-1"])
        .declare("stage-3-1", ok(), ["stage-2"])
        .declare("stage-3-2", ok(), ["stage-2"])
        .declare("stage-3-3", ok(), ["stage-2"])
        .declare("stage-4", ok(), ["stage-3-1", "stage-3-2", "stage-3-3"])
        .set_terminal(["stage-4"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert_eq!(changes.count(StageState::Runnable), 6);
    assert_eq!(changes.count(StageState::Running), 2);
    assert_eq!(changes.count(StageState::Done), 2);
    assert_eq!(changes.count(StageState::Skipped), 4);

    let failures = changes.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, "stage-2");
    assert_eq!(failures[0].state, StageState::Done);
    assert_eq!(failures[0].error.as_deref(), Some("fake error"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transitive_failure_leaves_single_error() {
    let mut executor = Executor::new();
    executor
        .declare("A", fail("A broke"), [StageName::START])
        .declare("B", ok(), ["A"])
        .declare("C", ok(), ["A"])
        .declare("D", ok(), ["B", "C"])
        .set_terminal(["D"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert_eq!(executor.errors().len(), 1);
    for name in ["B", "C", "D", "end"] {
        assert_eq!(executor.state_of(name), Some(StageState::Skipped), "stage {name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_branch_poisons_join_but_not_sibling() {
    let mut executor = Executor::new();
    executor
        .declare("left", fail("left broke"), [StageName::START])
        .declare("right", ok(), [StageName::START])
        .declare("right-child", ok(), ["right"])
        .declare("join", ok(), ["left", "right-child"])
        .set_terminal(["join"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert_eq!(executor.state_of("right"), Some(StageState::Done));
    assert_eq!(executor.state_of("right-child"), Some(StageState::Done));
    assert_eq!(executor.state_of("join"), Some(StageState::Skipped));
    assert_eq!(executor.errors().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_failures_are_reported_in_declaration_order() {
    let mut executor = Executor::new();
    executor
        .declare(
            "slow-fail",
            |_ctx: StageContext| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Err::<(), _>(anyhow::anyhow!("slow"))
            },
            [StageName::START],
        )
        .declare("fast-fail", fail("fast"), [StageName::START])
        .set_terminal(["slow-fail", "fast-fail"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    let stages: Vec<String> = executor
        .errors()
        .iter()
        .map(|f| f.stage.to_string())
        .collect();
    assert_eq!(stages, vec!["slow-fail", "fast-fail"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finalizer_runs_after_failures() {
    // start --> stage-1 -- ERROR --> stage-2 --> stage-3-1 --> end
    //                                       \--> stage-3-2 /
    let visits = VisitRecorder::new();
    let mut executor = Executor::new();
    executor
        .declare("stage-1", record_and_fail(&visits, "fake error"), [StageName::START])
        .declare("stage-2", record_and_fail(&visits, "fake error"), ["stage-1"])
        .declare("stage-3-1", record_and_fail(&visits, "fake error"), ["stage-2"])
        .declare("stage-3-2", record_and_fail(&visits, "fake error"), ["stage-2"])
        .set_terminal(["stage-3-1", "stage-3-2"])
        .set_finalizer(record(&visits));

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert_eq!(executor.errors().len(), 1);
    assert_eq!(
        visits.snapshot(),
        vec![StageName::from("stage-1"), StageName::final_tag()]
    );
    assert!(executor.finalizer_error().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finalizer_error_is_kept_apart_from_stage_errors() {
    let mut executor = Executor::new();
    executor
        .declare("stage-1", ok(), [StageName::START])
        .set_terminal(["stage-1"])
        .set_finalizer(fail("cleanup failed"));

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert!(executor.errors().is_empty());
    let err = executor.finalizer_error().expect("finalizer error recorded");
    assert_eq!(err.to_string(), "cleanup failed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn latest_finalizer_wins() {
    let visits = VisitRecorder::new();
    let first = visits.clone();
    let mut executor = Executor::new();
    executor
        .set_terminal([StageName::START])
        .set_finalizer(move |_ctx: StageContext| {
            let first = first.clone();
            async move {
                first.record("first-finalizer");
                anyhow::Ok(())
            }
        })
        .set_finalizer(record(&visits));

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert_eq!(visits.snapshot(), vec![StageName::final_tag()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_stage_is_recorded_as_failure() {
    let mut executor = Executor::new();
    executor
        .declare(
            "explodes",
            |_ctx: StageContext| async move {
                if true {
                    panic!("kaboom");
                }
                anyhow::Ok(())
            },
            [StageName::START],
        )
        .declare("after", ok(), ["explodes"])
        .set_terminal(["after"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert_eq!(executor.errors().len(), 1);
    assert_eq!(executor.state_of("explodes"), Some(StageState::Done));
    assert_eq!(executor.state_of("after"), Some(StageState::Skipped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stages_declared_after_terminal_still_run_before_it() {
    let changes = ChangeRecorder::new();
    let mut executor = Executor::new();
    executor
        .on_change(changes.callback())
        .declare("a", ok(), [StageName::START])
        .set_terminal(["a"])
        .declare("b", ok(), ["a"])
        .set_terminal(["b"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    let names: Vec<String> = executor.states().into_iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(names, vec!["a", "b", "end"]);
    assert_eq!(changes.last_state_of("end"), Some(StageState::Done));
    assert_eq!(changes.last_state_of("b"), Some(StageState::Done));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_change_callback_does_not_hang_the_run() {
    // start --> a ------------> end
    //      \--> b (fails) --> c /
    let mut executor = Executor::new();
    executor
        .on_change(|stage, state, _| panic!("observer bug on {stage} -> {state}"))
        .declare("a", ok(), [StageName::START])
        .declare("b", fail("b broke"), [StageName::START])
        .declare("c", ok(), ["b"])
        .set_terminal(["a", "c"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert!(executor.is_done());
    assert_eq!(executor.state_of("a"), Some(StageState::Done));
    assert_eq!(executor.state_of("b"), Some(StageState::Done));
    assert_eq!(executor.state_of("c"), Some(StageState::Skipped));
    assert_eq!(executor.state_of("end"), Some(StageState::Skipped));
    assert_eq!(executor.errors().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callback_panicking_only_on_done_still_unblocks_dependents() {
    let mut executor = Executor::new();
    executor
        .on_change(|_, state, _| {
            if state == StageState::Done {
                panic!("observer bug");
            }
        })
        .declare("a", ok(), [StageName::START])
        .declare("b", ok(), ["a"])
        .set_terminal(["b"]);

    executor.start(CancellationToken::shared()).unwrap();
    wait_within(&executor, LIMIT).await.unwrap();

    assert!(executor.errors().is_empty());
    assert_eq!(executor.state_of("b"), Some(StageState::Done));
    assert_eq!(executor.state_of("end"), Some(StageState::Done));
}

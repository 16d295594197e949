// ABOUTME: Integration tests for the sequential task runner
// ABOUTME: Covers skip handling, failure policies, group derivation, and one-shot completion

use futures::FutureExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagehand::engine::{
    Completion, CompletionSignal, EngineError, FailurePolicy, Group, GroupStatus, RunSnapshot,
    RunStatus, SharedContext, SkipDecision, Task, TaskActionError, TaskFailure, TaskRunner,
    TaskStatus,
};

mod common;
use common::{failing_task, ok_task, skipped_task, slow_task, CallLog, TestContext};

fn groups() -> Vec<Group> {
    vec![Group::new("A", "Group A"), Group::new("B", "Group B")]
}

/// Completion callback that counts invocations and keeps the last error.
fn counting_signal() -> (CompletionSignal, Arc<AtomicUsize>, Arc<Mutex<Option<TaskFailure>>>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let error = Arc::new(Mutex::new(None));
    let signal = {
        let fired = Arc::clone(&fired);
        let error = Arc::clone(&error);
        CompletionSignal::from_fn(move |failure| {
            fired.fetch_add(1, Ordering::SeqCst);
            *error.lock().unwrap() = failure;
        })
    };
    (signal, fired, error)
}

#[tokio::test]
async fn test_all_tasks_succeed() {
    let log = CallLog::new();
    let tasks = vec![
        ok_task("t1", "A", &log),
        ok_task("t2", "A", &log),
        ok_task("t3", "B", &log),
    ];
    let (signal, fired, error) = counting_signal();

    let outcome = TaskRunner::new(tasks, groups())
        .unwrap()
        .run(TestContext::new(), signal)
        .await;

    assert_eq!(log.calls(), vec!["t1", "t2", "t3"]);
    assert_eq!(outcome.snapshot.count(TaskStatus::Success), 3);
    assert!(outcome.snapshot.is_complete);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(error.lock().unwrap().is_none());
    assert_eq!(outcome.completion, Completion::Finished);
    assert_eq!(outcome.report.status, RunStatus::Success);
    assert_eq!(outcome.context.len(), 3);
}

#[tokio::test]
async fn test_skipped_task_never_runs() {
    let log = CallLog::new();
    let tasks = vec![
        ok_task("t1", "A", &log),
        skipped_task("t2", "A", "Already exists", &log),
        ok_task("t3", "B", &log),
    ];

    let outcome = TaskRunner::new(tasks, groups())
        .unwrap()
        .run(TestContext::new(), CompletionSignal::noop())
        .await;

    assert_eq!(log.count("t2"), 0);
    let t2 = outcome.snapshot.task("t2").unwrap();
    assert_eq!(t2.state.status, TaskStatus::Skipped);
    assert_eq!(t2.state.message.as_deref(), Some("Already exists"));
    assert_eq!(outcome.snapshot.task("t3").unwrap().state.status, TaskStatus::Success);
    assert_eq!(outcome.report.summary.skipped, 1);
    assert_eq!(outcome.report.status, RunStatus::Success);
}

#[tokio::test]
async fn test_halt_on_error_stops_at_failure() {
    let log = CallLog::new();
    let tasks = vec![
        ok_task("t1", "A", &log),
        failing_task("t2", "A", "boom", &log),
        ok_task("t3", "B", &log),
    ];
    let (signal, fired, error) = counting_signal();

    let outcome = TaskRunner::new(tasks, groups())
        .unwrap()
        .with_exit_on_error(true)
        .run(TestContext::new(), signal)
        .await;

    assert_eq!(log.calls(), vec!["t1", "t2"]);
    let t2 = outcome.snapshot.task("t2").unwrap();
    assert_eq!(t2.state.status, TaskStatus::Error);
    assert_eq!(t2.state.message.as_deref(), Some("boom"));
    assert_eq!(outcome.snapshot.task("t3").unwrap().state.status, TaskStatus::Pending);

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let failure = error.lock().unwrap().clone().unwrap();
    assert_eq!(failure.task_key, "t2");
    assert_eq!(failure.message, "boom");

    assert!(outcome.completion.is_halted());
    assert_eq!(outcome.report.status, RunStatus::Halted);
    assert_eq!(outcome.report.summary.pending, 1);
    assert_eq!(outcome.snapshot.groups[1].status, GroupStatus::Pending);
    assert_eq!(outcome.snapshot.terminal_error, Some(failure));
}

#[tokio::test]
async fn test_continue_on_error_runs_everything() {
    let log = CallLog::new();
    let tasks = vec![
        ok_task("t1", "A", &log),
        failing_task("t2", "A", "boom", &log),
        ok_task("t3", "B", &log),
    ];
    let (signal, fired, error) = counting_signal();

    let outcome = TaskRunner::new(tasks, groups())
        .unwrap()
        .with_policy(FailurePolicy::ContinueOnError)
        .run(TestContext::new(), signal)
        .await;

    assert_eq!(log.calls(), vec!["t1", "t2", "t3"]);
    assert_eq!(outcome.snapshot.task("t2").unwrap().state.status, TaskStatus::Error);
    assert_eq!(outcome.snapshot.task("t3").unwrap().state.status, TaskStatus::Success);
    assert!(outcome.snapshot.tasks.iter().all(|t| t.state.is_finished()));

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(error.lock().unwrap().is_none());
    assert_eq!(outcome.completion, Completion::Finished);
    assert_eq!(outcome.report.status, RunStatus::CompletedWithErrors);
    assert_eq!(outcome.report.summary.failed, 1);
    assert_eq!(outcome.snapshot.groups[0].status, GroupStatus::Error);
}

#[tokio::test]
async fn test_group_derivation_mid_run() {
    let log = CallLog::new();
    let tasks = vec![
        ok_task("t1", "A", &log),
        ok_task("t2", "A", &log),
        ok_task("t3", "B", &log),
    ];
    let seen: Arc<Mutex<Vec<RunSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    TaskRunner::new(tasks, groups())
        .unwrap()
        .with_observer(move |snapshot| sink.lock().unwrap().push(snapshot.clone()))
        .run(TestContext::new(), CompletionSignal::noop())
        .await;

    let seen = seen.lock().unwrap();
    let mid = seen
        .iter()
        .find(|s| {
            s.task("t1").unwrap().state.status == TaskStatus::Success
                && s.task("t2").unwrap().state.status == TaskStatus::Pending
        })
        .expect("snapshot after t1 succeeded");

    assert_eq!(mid.group("A").unwrap().status, GroupStatus::Active);
    assert_eq!(mid.group("B").unwrap().status, GroupStatus::Pending);
    assert_eq!(mid.current_group.as_deref(), Some("A"));

    let last = seen.last().unwrap();
    assert!(last.is_complete);
    assert_eq!(last.group("A").unwrap().status, GroupStatus::Complete);
    assert_eq!(last.group("B").unwrap().status, GroupStatus::Complete);
}

#[tokio::test]
async fn test_empty_task_list_completes_immediately() {
    let (signal, fired, error) = counting_signal();

    let outcome = TaskRunner::<TestContext>::new(Vec::new(), groups())
        .unwrap()
        .run(TestContext::new(), signal)
        .await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(error.lock().unwrap().is_none());
    assert!(outcome.snapshot.is_complete);
    assert_eq!(outcome.report.status, RunStatus::Success);
    assert_eq!(outcome.report.summary.total_tasks, 0);
}

#[tokio::test]
async fn test_at_most_one_task_running_at_any_snapshot() {
    let log = CallLog::new();
    let tasks = vec![
        slow_task("t1", "A", &log, Duration::from_millis(5)),
        skipped_task("t2", "A", "nope", &log),
        slow_task("t3", "B", &log, Duration::from_millis(5)),
        failing_task("t4", "B", "bad", &log),
        ok_task("t5", "B", &log),
    ];
    let max_running = Arc::new(AtomicUsize::new(0));
    let snapshots = Arc::new(AtomicUsize::new(0));
    let (max, count) = (Arc::clone(&max_running), Arc::clone(&snapshots));

    let outcome = TaskRunner::new(tasks, groups())
        .unwrap()
        .with_policy(FailurePolicy::ContinueOnError)
        .with_observer(move |snapshot| {
            count.fetch_add(1, Ordering::SeqCst);
            max.fetch_max(snapshot.running_count(), Ordering::SeqCst);
        })
        .run(TestContext::new(), CompletionSignal::noop())
        .await;

    assert_eq!(max_running.load(Ordering::SeqCst), 1);
    assert!(snapshots.load(Ordering::SeqCst) >= 5);
    // Every task terminal, each run task invoked exactly once
    assert_eq!(outcome.report.summary.pending, 0);
    for key in ["t1", "t3", "t4", "t5"] {
        assert_eq!(log.count(key), 1, "{}", key);
    }
    assert_eq!(log.count("t2"), 0);
}

#[tokio::test]
async fn test_context_updates_are_visible_to_later_tasks() {
    let log = CallLog::new();
    let seen_by_t2 = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen_by_t2);

    let reader = Task::from_fn("t2", "Read", "A", move |ctx: &mut SharedContext<TestContext>| {
        let sink = Arc::clone(&sink);
        async move {
            *sink.lock().unwrap() = ctx.get().get("t1").cloned();
            ctx.update(|_| BTreeMap::from([("t2".to_string(), "read".to_string())]));
            Ok::<(), TaskActionError>(())
        }
        .boxed()
    });
    let skip_if_done = ok_task("t3", "B", &log).with_skip(|ctx: &TestContext| {
        if ctx.contains_key("t2") {
            SkipDecision::skip("t2 already ran")
        } else {
            SkipDecision::Run
        }
    });

    let outcome = TaskRunner::new(vec![ok_task("t1", "A", &log), reader, skip_if_done], groups())
        .unwrap()
        .run(TestContext::new(), CompletionSignal::noop())
        .await;

    assert_eq!(seen_by_t2.lock().unwrap().as_deref(), Some("done"));
    assert_eq!(outcome.context["t2"], "read");
    let t3 = outcome.snapshot.task("t3").unwrap();
    assert_eq!(t3.state.status, TaskStatus::Skipped);
    assert_eq!(t3.state.message.as_deref(), Some("t2 already ran"));
}

#[tokio::test]
async fn test_spawned_run_streams_progress_and_completes_once() {
    let log = CallLog::new();
    let tasks = vec![
        slow_task("t1", "A", &log, Duration::from_millis(10)),
        failing_task("t2", "B", "boom", &log),
    ];

    let mut handle = TaskRunner::new(tasks, groups()).unwrap().spawn(TestContext::new());
    let mut progress = handle.progress();
    let completion = (&mut handle.completion).await.unwrap();

    assert_eq!(
        completion,
        Completion::Halted(TaskFailure {
            task_key: "t2".to_string(),
            message: "boom".to_string(),
        })
    );

    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.report.status, RunStatus::Halted);

    let last = progress.borrow_and_update().clone();
    assert!(last.is_complete);
    assert_eq!(last, outcome.snapshot);
}

#[test]
fn test_registration_errors() {
    let log = CallLog::new();

    let unknown = TaskRunner::new(vec![ok_task("t1", "Z", &log)], groups());
    assert!(matches!(unknown, Err(EngineError::UnknownGroup { .. })));

    let duplicate = TaskRunner::new(
        vec![ok_task("t1", "A", &log), ok_task("t1", "B", &log)],
        groups(),
    );
    assert!(matches!(duplicate, Err(EngineError::DuplicateTaskKey { .. })));
}

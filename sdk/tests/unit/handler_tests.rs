//! Decision task handling against in-memory history and response sinks.

use crate::init_tracing;
use crate::support::{
    execution, full_task, payload, sticky_task, task, InMemoryHistory, RecordingSink, Response,
};
use cadence_core::{Decision, HistoryBuilder};
use cadence_sdk::prelude::*;
use cadence_sdk::telemetry::names;
use cadence_sdk::{DecisionTaskFailedCause, HandledDecisionTask, InMemoryMetrics};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    handler: DecisionTaskHandler,
    history: Arc<InMemoryHistory>,
    sink: Arc<RecordingSink>,
    metrics: Arc<InMemoryMetrics>,
}

fn registry() -> Arc<WorkflowRegistry> {
    let registry = WorkflowRegistry::new();
    registry
        .register_fn("greeting", |_ctx: WorkflowContext, name: String| async move {
            Ok::<_, CadenceError>(format!("hello {}", name))
        })
        .unwrap();
    registry
        .register_fn("napper", |ctx: WorkflowContext, _input: Value| async move {
            ctx.sleep(Duration::from_secs(30)).await?;
            Ok::<_, CadenceError>("rested")
        })
        .unwrap();
    registry
        .register_fn("broken", |_ctx: WorkflowContext, _input: Value| async move {
            if true {
                panic!("invariant violated");
            }
            Ok::<_, CadenceError>(())
        })
        .unwrap();
    Arc::new(registry)
}

fn fixture(config: DecisionWorkerConfig) -> Fixture {
    init_tracing();
    let history = Arc::new(InMemoryHistory::new());
    let sink = Arc::new(RecordingSink::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let handler = DecisionTaskHandler::new(config, registry(), history.clone(), sink.clone())
        .with_metrics(metrics.clone());
    Fixture {
        handler,
        history,
        sink,
        metrics,
    }
}

fn default_fixture() -> Fixture {
    fixture(DecisionWorkerConfig::default().with_identity("worker-1@host"))
}

/// First decision task of a "napper" run. Returns the live started id.
fn napper_first_task(history: &mut HistoryBuilder) -> i64 {
    history.workflow_started("napper", None);
    history.live_decision_task()
}

// ==== Completion ====

#[tokio::test]
async fn test_completed_response_carries_decisions() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    history.workflow_started("greeting", Some(payload("bob")));
    let started = history.live_decision_task();

    let handled = f
        .handler
        .handle(full_task("greeting", &history, started))
        .await
        .unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Completed {
            decisions: 1,
            workflow_completed: true
        }
    );
    let response = f.sink.last_completed();
    assert_eq!(response.task_token, b"task-token".to_vec());
    assert_eq!(response.identity, "worker-1@host");
    assert_eq!(
        response.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload("hello bob"))
        }]
    );
    assert_eq!(f.sink.responses().len(), 1);
    assert_eq!(f.metrics.counter(names::DECISION_TASK_COMPLETED), 1);
    assert_eq!(f.metrics.counter(names::DECISIONS_SENT), 1);
    assert_eq!(f.metrics.durations(names::DECISION_TASK_LATENCY).len(), 1);
}

#[tokio::test]
async fn test_completed_run_is_not_cached() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    history.workflow_started("greeting", Some(payload("bob")));
    let started = history.live_decision_task();

    f.handler
        .handle(full_task("greeting", &history, started))
        .await
        .unwrap();

    assert!(!f.handler.cache().contains(&execution()));
}

// ==== History paging ====

#[tokio::test]
async fn test_remaining_history_is_paged_in() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    history.workflow_started("greeting", Some(payload("bob")));
    let started = history.live_decision_task();
    let events = history.build();

    f.history.add_page(b"p2", vec![events[1].clone()], Some(b"p3"));
    f.history.add_page(b"p3", vec![events[2].clone()], None);
    let first_page =
        task("greeting", vec![events[0].clone()], started).with_next_page_token(b"p2".to_vec());

    let handled = f.handler.handle(first_page).await.unwrap();

    assert!(matches!(
        handled,
        HandledDecisionTask::Completed {
            workflow_completed: true,
            ..
        }
    ));
    assert_eq!(f.history.requests(), 2);
    assert_eq!(f.metrics.counter(names::HISTORY_PAGES_FETCHED), 2);
}

#[tokio::test]
async fn test_page_limit_fails_task() {
    let config = DecisionWorkerConfig::new("worker-1@host", 10, 100, 1).unwrap();
    let f = fixture(config);
    let mut history = HistoryBuilder::new();
    history.workflow_started("greeting", Some(payload("bob")));
    let started = history.live_decision_task();
    let events = history.build();

    f.history.add_page(b"p2", vec![events[1].clone()], Some(b"p3"));
    f.history.add_page(b"p3", vec![events[2].clone()], None);
    let first_page =
        task("greeting", vec![events[0].clone()], started).with_next_page_token(b"p2".to_vec());

    let handled = f.handler.handle(first_page).await.unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Failed {
            cause: DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure
        }
    );
    assert_eq!(f.history.requests(), 1);
}

#[tokio::test]
async fn test_history_fetch_error_fails_task() {
    let f = default_fixture();
    f.history.fail_with("frontend unavailable");
    let mut history = HistoryBuilder::new();
    history.workflow_started("greeting", None);
    let started = history.live_decision_task();
    let first_page =
        task("greeting", history.build(), started).with_next_page_token(b"p2".to_vec());

    f.handler.handle(first_page).await.unwrap();

    let failed = f.sink.last_failed();
    assert_eq!(failed.cause, DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure);
    let details = String::from_utf8(failed.details.unwrap()).unwrap();
    assert!(details.contains("frontend unavailable"));
    assert_eq!(f.metrics.counter(names::DECISION_TASK_FAILED), 1);
}

#[tokio::test]
async fn test_slow_history_page_times_out() {
    let config = DecisionWorkerConfig::default()
        .with_identity("worker-1@host")
        .with_history_fetch_timeout(Duration::from_millis(20));
    let f = fixture(config);
    f.history.delay_by(Duration::from_secs(5));
    let mut history = HistoryBuilder::new();
    history.workflow_started("greeting", None);
    let started = history.live_decision_task();
    let first_page =
        task("greeting", history.build(), started).with_next_page_token(b"p2".to_vec());

    let handled = f.handler.handle(first_page).await.unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Failed {
            cause: DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure
        }
    );
    let details = String::from_utf8(f.sink.last_failed().details.unwrap()).unwrap();
    assert!(details.contains("timed out"));
}

// ==== Engine cache ====

#[tokio::test]
async fn test_running_workflow_is_cached_and_resumed_from_sticky_history() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    let first = napper_first_task(&mut history);

    f.handler
        .handle(full_task("napper", &history, first))
        .await
        .unwrap();
    assert!(f.handler.cache().contains(&execution()));
    assert_eq!(f.metrics.counter(names::CACHE_MISS), 1);

    history.decision_task_completed(first - 1, first);
    let timer = history.timer_started("0", 30);
    history.timer_fired("0", timer);
    let second = history.live_decision_task();

    let handled = f
        .handler
        .handle(sticky_task("napper", &history, first, second))
        .await
        .unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Completed {
            decisions: 1,
            workflow_completed: true
        }
    );
    assert_eq!(f.metrics.counter(names::CACHE_HIT), 1);
    assert_eq!(
        f.sink.last_completed().decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload("rested"))
        }]
    );
    assert!(!f.handler.cache().contains(&execution()));
}

#[tokio::test]
async fn test_undelivered_response_evicts_cached_run() {
    let f = default_fixture();
    f.sink.reject_completed();
    let mut history = HistoryBuilder::new();
    let first = napper_first_task(&mut history);

    let result = f.handler.handle(full_task("napper", &history, first)).await;

    assert!(result.is_err());
    assert!(!f.handler.cache().contains(&execution()));
}

#[tokio::test]
async fn test_stale_cached_run_with_sticky_history_resets() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    history.workflow_started("napper", None);
    let scheduled = history.decision_task_scheduled();
    let first = history.decision_task_started(scheduled);
    f.handler
        .handle(full_task("napper", &history, first))
        .await
        .unwrap();
    assert!(f.handler.cache().contains(&execution()));

    history.decision_task_timed_out(scheduled, first);
    let retried = history.decision_task_scheduled();
    let retried_started = history.decision_task_started(retried);
    history.decision_task_completed(retried, retried_started);
    let timer = history.timer_started("0", 30);
    history.timer_fired("0", timer);
    let live = history.live_decision_task();

    let handled = f
        .handler
        .handle(sticky_task("napper", &history, retried_started, live))
        .await
        .unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Failed {
            cause: DecisionTaskFailedCause::ResetStickyTaskList
        }
    );
    assert!(!f.handler.cache().contains(&execution()));
}

#[tokio::test]
async fn test_sticky_history_without_cached_run_resets() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    let first = napper_first_task(&mut history);
    history.decision_task_completed(first - 1, first);
    let timer = history.timer_started("0", 30);
    history.timer_fired("0", timer);
    let second = history.live_decision_task();

    let handled = f
        .handler
        .handle(sticky_task("napper", &history, first, second))
        .await
        .unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Failed {
            cause: DecisionTaskFailedCause::ResetStickyTaskList
        }
    );
    assert!(f.handler.cache().is_empty());
}

#[tokio::test]
async fn test_disabled_cache_rebuilds_from_full_history() {
    let config = DecisionWorkerConfig::new("worker-1@host", 0, 100, 10).unwrap();
    let f = fixture(config);
    let mut history = HistoryBuilder::new();
    let first = napper_first_task(&mut history);

    f.handler
        .handle(full_task("napper", &history, first))
        .await
        .unwrap();
    assert!(f.handler.cache().is_empty());

    history.decision_task_completed(first - 1, first);
    let timer = history.timer_started("0", 30);
    history.timer_fired("0", timer);
    let second = history.live_decision_task();

    f.handler
        .handle(full_task("napper", &history, second))
        .await
        .unwrap();
    assert_eq!(
        f.sink.last_completed().decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload("rested"))
        }]
    );
    assert_eq!(f.metrics.counter(names::CACHE_HIT), 0);
}

// ==== Task failures ====

#[tokio::test]
async fn test_unknown_workflow_type_fails_task() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    history.workflow_started("unregistered", None);
    let started = history.live_decision_task();

    let handled = f
        .handler
        .handle(full_task("unregistered", &history, started))
        .await
        .unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Failed {
            cause: DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure
        }
    );
    let details = String::from_utf8(f.sink.last_failed().details.unwrap()).unwrap();
    assert!(details.contains("unregistered"));
}

#[tokio::test]
async fn test_panicking_workflow_fails_task_and_is_evicted() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    history.workflow_started("broken", None);
    let started = history.live_decision_task();

    let handled = f
        .handler
        .handle(full_task("broken", &history, started))
        .await
        .unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Failed {
            cause: DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure
        }
    );
    let details = String::from_utf8(f.sink.last_failed().details.unwrap()).unwrap();
    assert!(details.contains("invariant violated"));
    assert!(!f.handler.cache().contains(&execution()));
}

#[tokio::test]
async fn test_history_mismatch_is_nondeterministic() {
    let f = default_fixture();
    let mut history = HistoryBuilder::new();
    history.workflow_started("napper", None);
    history.decision_task();
    // napper starts a timer, never an activity
    history.activity_task_scheduled("0", "charge");
    let live = history.live_decision_task();

    let handled = f
        .handler
        .handle(full_task("napper", &history, live))
        .await
        .unwrap();

    assert_eq!(
        handled,
        HandledDecisionTask::Failed {
            cause: DecisionTaskFailedCause::NondeterministicHistory
        }
    );
    let responses = f.sink.responses();
    assert_eq!(responses.len(), 1);
    assert!(matches!(responses[0], Response::Failed(_)));
    assert!(!f.handler.cache().contains(&execution()));
}

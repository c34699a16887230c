//! End-to-end replay scenarios driven through `WorkflowEngine`.

use crate::init_tracing;
use crate::support::{execution, full_task, payload, sticky_task};
use cadence_core::{CoreError, Decision, HistoryBuilder, TimeoutType, WorkflowExecution};
use cadence_sdk::prelude::*;
use cadence_sdk::workflow::WorkflowFn;
use cadence_sdk::{CancellableFuture, JsonCodec, NoopMetrics, WorkflowEngine, WorkflowInfo};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WORKFLOW_TYPE: &str = "order";

fn engine(f: WorkflowFn) -> WorkflowEngine {
    init_tracing();
    let info = WorkflowInfo {
        workflow_execution: execution(),
        workflow_type: WORKFLOW_TYPE.to_string(),
        domain: "samples".to_string(),
        task_list: "orders".to_string(),
    };
    WorkflowEngine::new(info, f, Arc::new(JsonCodec), Arc::new(NoopMetrics))
}

fn greeting_workflow() -> WorkflowFn {
    workflow_fn(|ctx: WorkflowContext, name: String| async move {
        let greeting: String = ctx
            .execute_activity("greet", &name, ActivityOptions::default())
            .await?;
        Ok::<_, CadenceError>(format!("{}!", greeting))
    })
}

/// Started, first decision task done, activity "0" scheduled, started and
/// completed, second decision task in flight. Returns the live started id.
fn greeting_history(history: &mut HistoryBuilder) -> i64 {
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    history.decision_task();
    let scheduled = history.activity_task_scheduled("0", "greet");
    let started = history.activity_task_started(scheduled);
    history.activity_task_completed(scheduled, started, Some(payload("hello bob")));
    history.live_decision_task()
}

fn decision_types(decisions: &[Decision]) -> Vec<&'static str> {
    decisions.iter().map(Decision::decision_type).collect()
}

// ==== Activities ====

#[test]
fn test_first_task_schedules_activity() {
    let mut engine = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    let started = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();

    assert!(!completion.workflow_completed);
    match &completion.decisions[..] {
        [Decision::ScheduleActivityTask(attrs)] => {
            assert_eq!(attrs.activity_id, "0");
            assert_eq!(attrs.activity_type, "greet");
            assert_eq!(attrs.task_list, "orders");
            assert_eq!(attrs.input, Some(payload("bob")));
            assert_eq!(attrs.start_to_close_timeout_seconds, 240);
        }
        other => panic!("unexpected decisions {:?}", other),
    }
}

#[test]
fn test_activity_completion_completes_workflow() {
    let mut engine = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    let started = greeting_history(&mut history);

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();

    assert!(completion.workflow_completed);
    assert!(engine.is_completed());
    let completes: Vec<_> = completion
        .decisions
        .iter()
        .filter(|d| d.is_terminal())
        .collect();
    assert_eq!(completes.len(), 1);
    assert_eq!(
        completion.decisions.last(),
        Some(&Decision::CompleteWorkflowExecution {
            result: Some(payload("hello bob!"))
        })
    );
}

#[test]
fn test_cached_engine_applies_only_new_events() {
    let mut engine = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    let first_started = history.live_decision_task();

    let first = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, first_started))
        .unwrap();
    assert_eq!(decision_types(&first.decisions), vec!["ScheduleActivityTask"]);

    history.decision_task_completed(first_started - 1, first_started);
    let scheduled = history.activity_task_scheduled("0", "greet");
    let started = history.activity_task_started(scheduled);
    history.activity_task_completed(scheduled, started, Some(payload("hello bob")));
    let second_started = history.live_decision_task();

    let second = engine
        .process_decision_task(&sticky_task(
            WORKFLOW_TYPE,
            &history,
            first_started,
            second_started,
        ))
        .unwrap();

    assert!(second.workflow_completed);
    assert_eq!(decision_types(&second.decisions), vec!["CompleteWorkflowExecution"]);
    assert_eq!(engine.last_processed_event_id(), second_started);
}

#[test]
fn test_activity_id_in_use_is_rejected() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, name: String| async move {
        let options = ActivityOptions::default().with_activity_id("a1");
        let first = ctx.schedule_activity::<_, String>("greet", &name, options.clone())?;
        let rejected = matches!(
            ctx.schedule_activity::<_, String>("charge", &name, options),
            Err(CadenceError::InvalidInput(_))
        );
        let greeting = first.await?;
        Ok::<_, CadenceError>((greeting, rejected))
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    let first_started = history.live_decision_task();

    let first = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, first_started))
        .unwrap();
    match &first.decisions[..] {
        [Decision::ScheduleActivityTask(attrs)] => {
            assert_eq!(attrs.activity_id, "a1");
            assert_eq!(attrs.activity_type, "greet");
        }
        other => panic!("unexpected decisions {:?}", other),
    }

    history.decision_task_completed(first_started - 1, first_started);
    let scheduled = history.activity_task_scheduled("a1", "greet");
    let started = history.activity_task_started(scheduled);
    history.activity_task_completed(scheduled, started, Some(payload("hello bob")));
    let live = history.live_decision_task();

    let second = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();
    assert_eq!(
        second.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload(("hello bob", true)))
        }]
    );
}

#[test]
fn test_activity_failure_fails_workflow() {
    let mut engine = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    history.decision_task();
    let scheduled = history.activity_task_scheduled("0", "greet");
    let started = history.activity_task_started(scheduled);
    history.activity_task_failed(scheduled, started, "CARD_DECLINED", None);
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();

    match &completion.decisions[..] {
        [Decision::FailWorkflowExecution { reason, details }] => {
            assert_eq!(reason, "ACTIVITY_FAILED");
            let message: String = serde_json::from_slice::<Vec<String>>(details.as_ref().unwrap())
                .unwrap()
                .remove(0);
            assert!(message.contains("CARD_DECLINED"));
        }
        other => panic!("unexpected decisions {:?}", other),
    }
}

#[test]
fn test_activity_timeout_surfaces_timeout_reason() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        let outcome: Result<String> = ctx
            .execute_activity("greet", "bob", ActivityOptions::default())
            .await;
        match outcome {
            Err(CadenceError::ActivityFailed { reason, .. }) => Ok::<_, CadenceError>(reason),
            other => Ok(format!("{:?}", other)),
        }
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    history.decision_task();
    let scheduled = history.activity_task_scheduled("0", "greet");
    let started = history.activity_task_started(scheduled);
    history.activity_task_timed_out(scheduled, started, TimeoutType::StartToClose);
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();

    assert_eq!(
        completion.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload("TIMEOUT_START_TO_CLOSE"))
        }]
    );
}

#[test]
fn test_parallel_activities_keep_call_order() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        let a = ctx.schedule_activity::<_, u32>("charge", &1, ActivityOptions::default())?;
        let b = ctx.schedule_activity::<_, u32>("ship", &2, ActivityOptions::default())?;
        let (a, b) = futures::join!(a, b);
        Ok::<_, CadenceError>(a? + b?)
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let started = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();

    let ids: Vec<_> = completion
        .decisions
        .iter()
        .map(|d| match d {
            Decision::ScheduleActivityTask(attrs) => attrs.activity_id.clone(),
            other => panic!("unexpected decision {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec!["0", "1"]);
}

// ==== Timers ====

#[test]
fn test_timer_fires_and_workflow_completes() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        ctx.sleep(Duration::from_millis(1500)).await?;
        Ok::<_, CadenceError>("woke")
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let first = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, first))
        .unwrap();
    match &completion.decisions[..] {
        [Decision::StartTimer(attrs)] => assert_eq!(attrs.start_to_fire_timeout_seconds, 2),
        other => panic!("unexpected decisions {:?}", other),
    }

    history.decision_task_completed(first - 1, first);
    let timer = history.timer_started("0", 2);
    history.timer_fired("0", timer);
    let second = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, second))
        .unwrap();
    assert_eq!(
        completion.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload("woke"))
        }]
    );
}

#[test]
fn test_timer_cancelled_before_start_emits_start_then_cancel() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        let timer = ctx.start_timer(Duration::from_secs(60));
        timer.cancel();
        let canceled = matches!(timer.await, Err(CadenceError::Canceled(_)));
        Ok::<_, CadenceError>(canceled)
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let started = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();

    assert_eq!(
        decision_types(&completion.decisions),
        vec!["StartTimer", "CancelTimer", "CompleteWorkflowExecution"]
    );
    assert_eq!(
        completion.decisions.last(),
        Some(&Decision::CompleteWorkflowExecution {
            result: Some(payload(true))
        })
    );
}

#[test]
fn test_zero_timer_needs_no_decision() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        ctx.sleep(Duration::ZERO).await?;
        Ok::<_, CadenceError>(1)
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let started = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();
    assert_eq!(decision_types(&completion.decisions), vec!["CompleteWorkflowExecution"]);
}

// ==== Side effects ====

fn side_effect_workflow(calls: Arc<AtomicUsize>) -> WorkflowFn {
    workflow_fn(move |ctx: WorkflowContext, _input: Value| {
        let calls = Arc::clone(&calls);
        async move {
            let n: u64 = ctx.side_effect(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                7u64
            })?;
            ctx.sleep(Duration::from_secs(10)).await?;
            Ok::<_, CadenceError>(n)
        }
    })
}

#[test]
fn test_side_effect_is_recorded_when_live() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = engine(side_effect_workflow(Arc::clone(&calls)));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let started = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match &completion.decisions[..] {
        [Decision::RecordMarker(marker), Decision::StartTimer(_)] => {
            assert_eq!(marker.marker_name, "SideEffect");
            assert_eq!(marker.marker_id, "0");
            assert_eq!(marker.details, Some(payload(7u64)));
        }
        other => panic!("unexpected decisions {:?}", other),
    }
}

#[test]
fn test_side_effect_replays_recorded_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = engine(side_effect_workflow(Arc::clone(&calls)));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    history.decision_task();
    // recorded value differs from what the closure would return now
    history.marker_recorded("SideEffect", "0", Some(payload(99u64)));
    // side effects have their own id sequence
    let timer = history.timer_started("0", 10);
    history.timer_fired("0", timer);
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        completion.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload(99u64))
        }]
    );
}

#[test]
fn test_missing_side_effect_marker_is_nondeterministic() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = engine(side_effect_workflow(Arc::clone(&calls)));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    history.decision_task();
    let live = history.live_decision_task();

    let err = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap_err();

    assert!(matches!(err, CadenceError::Replay(CoreError::MalformedHistory(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ==== Child workflows ====

#[test]
fn test_child_workflow_result_is_returned() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        let receipt: String = ctx
            .execute_child_workflow("invoice", "order-42", ChildWorkflowOptions::default())
            .await?;
        Ok::<_, CadenceError>(receipt)
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let first = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, first))
        .unwrap();
    match &completion.decisions[..] {
        [Decision::StartChildWorkflowExecution(attrs)] => {
            assert_eq!(attrs.workflow_id, "run-1_0");
            assert_eq!(attrs.workflow_type, "invoice");
            assert_eq!(attrs.domain, "samples");
        }
        other => panic!("unexpected decisions {:?}", other),
    }

    history.decision_task_completed(first - 1, first);
    let initiated = history.start_child_workflow_initiated("run-1_0", "invoice");
    let child_started = history.child_workflow_started("run-1_0", "child-run", initiated);
    history.child_workflow_completed("run-1_0", initiated, child_started, Some(payload("paid")));
    let second = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, second))
        .unwrap();
    assert_eq!(
        completion.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload("paid"))
        }]
    );
}

#[test]
fn test_child_workflow_failure_fails_parent() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        let receipt: String = ctx
            .execute_child_workflow(
                "invoice",
                "order-42",
                ChildWorkflowOptions::default().with_workflow_id("invoice-42"),
            )
            .await?;
        Ok::<_, CadenceError>(receipt)
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    history.decision_task();
    let initiated = history.start_child_workflow_initiated("invoice-42", "invoice");
    let child_started = history.child_workflow_started("invoice-42", "child-run", initiated);
    history.child_workflow_failed("invoice-42", initiated, child_started, "OUT_OF_STOCK");
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();
    match &completion.decisions[..] {
        [Decision::FailWorkflowExecution { reason, .. }] => {
            assert_eq!(reason, "CHILD_WORKFLOW_FAILED")
        }
        other => panic!("unexpected decisions {:?}", other),
    }
}

// ==== Signals and cancellation ====

#[test]
fn test_signal_resumes_waiting_workflow() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        let approver: String = ctx.receive_signal("approve").await?;
        Ok::<_, CadenceError>(format!("approved by {}", approver))
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let first = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, first))
        .unwrap();
    assert!(completion.decisions.is_empty());

    history.decision_task_completed(first - 1, first);
    history.workflow_signaled("approve", Some(payload("alice")));
    let second = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, second))
        .unwrap();
    assert_eq!(
        completion.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload("approved by alice"))
        }]
    );
}

#[test]
fn test_signal_before_wait_is_buffered() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        ctx.sleep(Duration::from_secs(5)).await?;
        let n: u32 = ctx.receive_signal("bump").await?;
        Ok::<_, CadenceError>(n)
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    history.decision_task();
    let timer = history.timer_started("0", 5);
    history.workflow_signaled("bump", Some(payload(3)));
    history.timer_fired("0", timer);
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();
    assert_eq!(
        completion.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload(3))
        }]
    );
}

#[test]
fn test_cancel_request_is_visible_to_workflow() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        ctx.sleep(Duration::from_secs(5)).await?;
        Ok::<_, CadenceError>(ctx.is_cancel_requested())
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    history.decision_task();
    let timer = history.timer_started("0", 5);
    history.workflow_cancel_requested("operator");
    history.timer_fired("0", timer);
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();
    assert_eq!(
        completion.decisions,
        vec![Decision::CompleteWorkflowExecution {
            result: Some(payload(true))
        }]
    );
}

// ==== External workflows and search attributes ====

#[test]
fn test_signal_external_and_upsert_decisions() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        let mut attributes = BTreeMap::new();
        attributes.insert("CustomerId".to_string(), json!("c-7"));
        ctx.upsert_search_attributes(attributes)?;
        ctx.signal_external_workflow(
            WorkflowExecution::new("billing", ""),
            "order-ready",
            "order-42",
            false,
        )?
        .await?;
        Ok::<_, CadenceError>(())
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let first = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, first))
        .unwrap();
    assert_eq!(
        decision_types(&completion.decisions),
        vec!["UpsertWorkflowSearchAttributes", "SignalExternalWorkflowExecution"]
    );

    history.decision_task_completed(first - 1, first);
    let mut recorded = BTreeMap::new();
    recorded.insert("CustomerId".to_string(), payload("c-7"));
    history.upsert_search_attributes(recorded);
    let initiated = history.signal_external_initiated("billing", "order-ready", "1");
    history.external_workflow_signaled("billing", initiated);
    let second = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, second))
        .unwrap();
    assert_eq!(decision_types(&completion.decisions), vec!["CompleteWorkflowExecution"]);
}

#[test]
fn test_rejected_external_signal_fails_workflow() {
    let mut engine = engine(workflow_fn(|ctx: WorkflowContext, _input: Value| async move {
        ctx.signal_external_workflow(
            WorkflowExecution::new("billing", ""),
            "order-ready",
            "order-42",
            false,
        )?
        .await?;
        Ok::<_, CadenceError>(())
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    history.decision_task();
    let initiated = history.signal_external_initiated("billing", "order-ready", "0");
    history.signal_external_failed("billing", initiated, "EXTERNAL_WORKFLOW_NOT_EXISTS");
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();
    match &completion.decisions[..] {
        [Decision::FailWorkflowExecution { reason, .. }] => {
            assert_eq!(reason, "EXTERNAL_WORKFLOW_FAILED")
        }
        other => panic!("unexpected decisions {:?}", other),
    }
}

// ==== Replay flags ====

#[test]
fn test_replay_flag_and_clock_follow_batches() {
    let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = Arc::clone(&observed);
    let mut engine = engine(workflow_fn(move |ctx: WorkflowContext, _input: Value| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().push((ctx.is_replaying(), ctx.current_time_millis()));
            ctx.sleep(Duration::from_secs(1)).await?;
            seen.lock().push((ctx.is_replaying(), ctx.current_time_millis()));
            Ok::<_, CadenceError>(())
        }
    }));
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, None);
    let (_, first_started, _) = history.decision_task();
    let timer = history.timer_started("0", 1);
    history.timer_fired("0", timer);
    let live = history.live_decision_task();

    let first_time = history.events()[(first_started - 1) as usize].timestamp;
    let live_time = history.events()[(live - 1) as usize].timestamp;

    engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();

    assert_eq!(
        *observed.lock(),
        vec![
            (true, first_time.timestamp_millis()),
            (false, live_time.timestamp_millis()),
        ]
    );
}

#[test]
fn test_failed_decision_task_is_replayed_as_live() {
    let mut engine = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    let scheduled = history.decision_task_scheduled();
    let started = history.decision_task_started(scheduled);
    history.decision_task_failed(scheduled, started, "WORKFLOW_WORKER_UNHANDLED_FAILURE");
    let live = history.live_decision_task();

    let completion = engine
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();

    // the failed task's schedule never reached history, so it is sent now
    assert_eq!(decision_types(&completion.decisions), vec!["ScheduleActivityTask"]);
}

// ==== Cached engine recovery ====

#[test]
fn test_cached_engine_resends_decisions_after_timed_out_task() {
    let mut cached = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    let scheduled = history.decision_task_scheduled();
    let started = history.decision_task_started(scheduled);

    let first = cached
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();
    assert_eq!(decision_types(&first.decisions), vec!["ScheduleActivityTask"]);

    // the response never reached the orchestrator
    history.decision_task_timed_out(scheduled, started);
    let live = history.live_decision_task();
    let task = full_task(WORKFLOW_TYPE, &history, live);

    let from_cache = cached.process_decision_task(&task).unwrap();
    let rebuilt = engine(greeting_workflow()).process_decision_task(&task).unwrap();

    assert_eq!(from_cache, rebuilt);
    assert_eq!(decision_types(&from_cache.decisions), vec!["ScheduleActivityTask"]);
    assert_eq!(cached.last_processed_event_id(), live);
}

#[test]
fn test_cached_engine_resends_decisions_after_failed_task() {
    let mut cached = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    let scheduled = history.decision_task_scheduled();
    let started = history.decision_task_started(scheduled);
    cached
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();

    history.decision_task_failed(scheduled, started, "UNHANDLED_DECISION");
    let live = history.live_decision_task();

    let completion = cached
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, live))
        .unwrap();
    assert_eq!(decision_types(&completion.decisions), vec!["ScheduleActivityTask"]);
}

#[test]
fn test_stale_engine_with_partial_history_is_rejected() {
    let mut cached = engine(greeting_workflow());
    let mut history = HistoryBuilder::new();
    history.workflow_started(WORKFLOW_TYPE, Some(payload("bob")));
    let scheduled = history.decision_task_scheduled();
    let started = history.decision_task_started(scheduled);
    cached
        .process_decision_task(&full_task(WORKFLOW_TYPE, &history, started))
        .unwrap();

    // another worker answered the retried task
    history.decision_task_timed_out(scheduled, started);
    let retried = history.decision_task_scheduled();
    let retried_started = history.decision_task_started(retried);
    history.decision_task_completed(retried, retried_started);
    let activity = history.activity_task_scheduled("0", "greet");
    let activity_started = history.activity_task_started(activity);
    history.activity_task_completed(activity, activity_started, Some(payload("hello bob")));
    let live = history.live_decision_task();

    let err = cached
        .process_decision_task(&sticky_task(WORKFLOW_TYPE, &history, retried_started, live))
        .unwrap_err();
    assert!(matches!(err, CadenceError::StaleState(_)));
}

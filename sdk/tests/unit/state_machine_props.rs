//! Property-based tests for decision state machine invariants
//!
//! These drive the decision manager directly with arbitrary interleavings of
//! cancellation requests, collections and history events.

use cadence_core::decision::{ScheduleActivityTaskDecisionAttributes, StartTimerDecisionAttributes};
use cadence_core::{Decision, DecisionId, DecisionManager, DecisionState, HistoryBuilder, HistoryEvent};
use proptest::prelude::*;

/// One input to an activity machine.
#[derive(Debug, Clone, Copy)]
enum Op {
    RequestCancel,
    Collect,
    Scheduled,
    Started,
    Completed,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::RequestCancel),
        Just(Op::Collect),
        Just(Op::Scheduled),
        Just(Op::Started),
        Just(Op::Completed),
    ]
}

fn activity(activity_id: &str) -> ScheduleActivityTaskDecisionAttributes {
    ScheduleActivityTaskDecisionAttributes {
        activity_id: activity_id.to_string(),
        activity_type: "charge".to_string(),
        task_list: "default".to_string(),
        start_to_close_timeout_seconds: 30,
        ..Default::default()
    }
}

/// Scheduled, started and completed events for activity "a1".
fn a1_lifecycle() -> Vec<HistoryEvent> {
    let mut history = HistoryBuilder::new();
    let scheduled = history.activity_task_scheduled("a1", "charge");
    let started = history.activity_task_started(scheduled);
    history.activity_task_completed(scheduled, started, None);
    history.build()
}

/// Drives a single "a1" machine; returns every decision batch collected.
struct Driver {
    manager: DecisionManager,
    events: Vec<HistoryEvent>,
    scheduled: bool,
    collected: Vec<Vec<Decision>>,
}

impl Driver {
    fn new() -> Self {
        let mut manager = DecisionManager::new();
        manager.schedule_activity(activity("a1"));
        Self {
            manager,
            events: a1_lifecycle(),
            scheduled: false,
            collected: Vec::new(),
        }
    }

    fn apply(&mut self, op: Op) {
        let id = DecisionId::activity("a1");
        match op {
            Op::RequestCancel => {
                self.manager.request_cancel(&id);
            }
            Op::Collect => {
                let decisions = self.manager.collect_pending_decisions();
                self.collected.push(decisions);
            }
            Op::Scheduled => {
                self.manager.handle_event(&self.events[0]).unwrap();
                self.scheduled = true;
            }
            // later events are only routable once the alias is known
            Op::Started if self.scheduled => {
                self.manager.handle_event(&self.events[1]).unwrap();
            }
            Op::Completed if self.scheduled => {
                self.manager.handle_event(&self.events[2]).unwrap();
            }
            Op::Started | Op::Completed => {}
        }
    }

    fn state(&self) -> DecisionState {
        self.manager.state_of(&DecisionId::activity("a1")).unwrap()
    }

    fn count(&self, decision_type: &str) -> usize {
        self.collected
            .iter()
            .flatten()
            .filter(|d| d.decision_type() == decision_type)
            .count()
    }
}

// ==== Fixed scenarios ====

#[test]
fn test_fresh_activity_schedules_exactly_once() {
    let mut manager = DecisionManager::new();
    manager.schedule_activity(activity("a1"));

    let first = manager.collect_pending_decisions();
    assert_eq!(first.len(), 1);
    assert!(matches!(&first[0], Decision::ScheduleActivityTask(a) if a.activity_id == "a1"));
    assert!(manager.collect_pending_decisions().is_empty());
    assert!(manager.collect_pending_decisions().is_empty());
}

#[test]
fn test_cancel_before_initiate_emits_start_then_cancel() {
    let mut manager = DecisionManager::new();
    let id = manager.start_timer(StartTimerDecisionAttributes {
        timer_id: "t1".to_string(),
        start_to_fire_timeout_seconds: 10,
    });

    assert!(manager.request_cancel(&id));
    let decisions = manager.collect_pending_decisions();

    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0].decision_type(), "StartTimer");
    assert_eq!(
        decisions[1],
        Decision::CancelTimer {
            timer_id: "t1".to_string()
        }
    );
}

// ==== Properties ====

proptest! {
    #[test]
    fn prop_second_collection_is_empty(ops in prop::collection::vec(arb_op(), 0..20)) {
        let mut driver = Driver::new();
        for op in ops {
            driver.apply(op);
            let _ = driver.manager.collect_pending_decisions();
            prop_assert!(driver.manager.collect_pending_decisions().is_empty());
        }
    }

    #[test]
    fn prop_each_decision_emitted_at_most_once(ops in prop::collection::vec(arb_op(), 0..30)) {
        let mut driver = Driver::new();
        for op in ops {
            driver.apply(op);
        }
        driver.apply(Op::Collect);

        prop_assert!(driver.count("ScheduleActivityTask") <= 1);
        prop_assert!(driver.count("RequestCancelActivityTask") <= 1);
    }

    #[test]
    fn prop_schedule_comes_first_when_collected_before_history(
        ops in prop::collection::vec(arb_op(), 0..30),
    ) {
        let mut driver = Driver::new();
        driver.apply(Op::Collect);
        for op in ops {
            driver.apply(op);
        }
        driver.apply(Op::Collect);

        let all: Vec<_> = driver.collected.iter().flatten().collect();
        prop_assert_eq!(driver.count("ScheduleActivityTask"), 1);
        prop_assert_eq!(all[0].decision_type(), "ScheduleActivityTask");
    }

    #[test]
    fn prop_terminal_machine_ignores_further_input(
        ops in prop::collection::vec(prop_oneof![Just(Op::RequestCancel), Just(Op::Collect)], 1..20),
    ) {
        let mut driver = Driver::new();
        for op in [Op::Collect, Op::Scheduled, Op::Started, Op::Completed, Op::Collect] {
            driver.apply(op);
        }
        prop_assert_eq!(driver.state(), DecisionState::Completed);
        let before = driver.count("RequestCancelActivityTask");

        for op in ops {
            prop_assert!(!driver.manager.request_cancel(&DecisionId::activity("a1")));
            driver.apply(op);
        }
        driver.apply(Op::Collect);

        prop_assert_eq!(driver.state(), DecisionState::Completed);
        prop_assert_eq!(driver.count("RequestCancelActivityTask"), before);
    }

    #[test]
    fn prop_events_for_one_activity_leave_the_other_alone(
        picks in prop::collection::vec(0usize..4, 0..12),
    ) {
        let mut history = HistoryBuilder::new();
        let s1 = history.activity_task_scheduled("a1", "charge");
        let s2 = history.activity_task_scheduled("a2", "refund");
        let st1 = history.activity_task_started(s1);
        history.activity_task_completed(s1, st1, None);
        history.activity_task_failed(s1, st1, "DECLINED", None);
        history.activity_task_canceled(s1, st1);
        let events = history.build();
        prop_assert_eq!(events[1].event_id, s2);

        let mut manager = DecisionManager::new();
        manager.schedule_activity(activity("a1"));
        manager.schedule_activity(activity("a2"));
        manager.collect_pending_decisions();
        manager.handle_event(&events[0]).unwrap();
        manager.handle_event(&events[1]).unwrap();

        let a2 = DecisionId::activity("a2");
        prop_assert_eq!(manager.state_of(&a2), Some(DecisionState::Initiated));

        // started, completed, failed, canceled for a1 only
        for pick in picks {
            manager.handle_event(&events[2 + pick]).unwrap();
            prop_assert_eq!(manager.state_of(&a2), Some(DecisionState::Initiated));
        }
    }
}

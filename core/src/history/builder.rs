//! Fluent construction of histories.
//!
//! Each append assigns the next event id and advances the clock by one second,
//! returning the new event's id so later events can reference it.
//!
//! ```
//! use cadence_core::history::HistoryBuilder;
//!
//! let mut history = HistoryBuilder::new();
//! history.workflow_started("Greeting", None);
//! let (_, started, _) = history.decision_task();
//! let scheduled = history.activity_task_scheduled("a1", "Echo");
//! assert_eq!(started, 3);
//! assert_eq!(scheduled, 5);
//! ```

use super::event::*;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Builds a history with consecutive event ids.
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    events: Vec<HistoryEvent>,
    clock: DateTime<Utc>,
    step: Duration,
}

impl Default for HistoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuilder {
    /// Starts at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            clock: DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap_or_default(),
            step: Duration::seconds(1),
        }
    }

    pub fn with_start_time(mut self, time: DateTime<Utc>) -> Self {
        self.clock = time;
        self
    }

    /// Move the clock forward without appending an event.
    pub fn advance(&mut self, by: Duration) -> &mut Self {
        self.clock += by;
        self
    }

    pub fn next_event_id(&self) -> i64 {
        self.events.len() as i64 + 1
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    pub fn build(&self) -> Vec<HistoryEvent> {
        self.events.clone()
    }

    /// Append an arbitrary event.
    pub fn add(&mut self, attributes: EventAttributes) -> i64 {
        self.clock += self.step;
        let event_id = self.next_event_id();
        self.events
            .push(HistoryEvent::new(event_id, self.clock, attributes));
        event_id
    }

    fn last_completed_task(&self) -> i64 {
        self.events
            .iter()
            .rev()
            .find(|e| e.event_type() == EventType::DecisionTaskCompleted)
            .map(|e| e.event_id)
            .unwrap_or(0)
    }

    // ==== Workflow execution ====

    pub fn workflow_started(&mut self, workflow_type: &str, input: Option<Payload>) -> i64 {
        self.add(EventAttributes::WorkflowExecutionStarted(
            WorkflowExecutionStartedEventAttributes {
                workflow_type: workflow_type.to_string(),
                task_list: "default".to_string(),
                input,
                execution_start_to_close_timeout_seconds: 3600,
                task_start_to_close_timeout_seconds: 10,
                attempt: 0,
                ..Default::default()
            },
        ))
    }

    pub fn workflow_completed(&mut self, result: Option<Payload>) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::WorkflowExecutionCompleted(
            WorkflowExecutionCompletedEventAttributes {
                result,
                decision_task_completed_event_id: completed,
            },
        ))
    }

    pub fn workflow_signaled(&mut self, signal_name: &str, input: Option<Payload>) -> i64 {
        self.add(EventAttributes::WorkflowExecutionSignaled(
            WorkflowExecutionSignaledEventAttributes {
                signal_name: signal_name.to_string(),
                input,
                identity: String::new(),
            },
        ))
    }

    pub fn workflow_cancel_requested(&mut self, cause: &str) -> i64 {
        self.add(EventAttributes::WorkflowExecutionCancelRequested(
            WorkflowExecutionCancelRequestedEventAttributes {
                cause: cause.to_string(),
                identity: String::new(),
            },
        ))
    }

    // ==== Decision tasks ====

    pub fn decision_task_scheduled(&mut self) -> i64 {
        self.add(EventAttributes::DecisionTaskScheduled(
            DecisionTaskScheduledEventAttributes {
                task_list: "default".to_string(),
                start_to_close_timeout_seconds: 10,
                attempt: 0,
            },
        ))
    }

    pub fn decision_task_started(&mut self, scheduled_event_id: i64) -> i64 {
        self.add(EventAttributes::DecisionTaskStarted(
            DecisionTaskStartedEventAttributes {
                scheduled_event_id,
                ..Default::default()
            },
        ))
    }

    pub fn decision_task_completed(&mut self, scheduled_event_id: i64, started_event_id: i64) -> i64 {
        self.add(EventAttributes::DecisionTaskCompleted(
            DecisionTaskCompletedEventAttributes {
                scheduled_event_id,
                started_event_id,
                ..Default::default()
            },
        ))
    }

    pub fn decision_task_failed(
        &mut self,
        scheduled_event_id: i64,
        started_event_id: i64,
        cause: &str,
    ) -> i64 {
        self.add(EventAttributes::DecisionTaskFailed(
            DecisionTaskFailedEventAttributes {
                scheduled_event_id,
                started_event_id,
                cause: cause.to_string(),
                ..Default::default()
            },
        ))
    }

    pub fn decision_task_timed_out(&mut self, scheduled_event_id: i64, started_event_id: i64) -> i64 {
        self.add(EventAttributes::DecisionTaskTimedOut(
            DecisionTaskTimedOutEventAttributes {
                scheduled_event_id,
                started_event_id,
                timeout_type: TimeoutType::StartToClose,
            },
        ))
    }

    /// Scheduled, started and completed; returns the three ids.
    pub fn decision_task(&mut self) -> (i64, i64, i64) {
        let scheduled = self.decision_task_scheduled();
        let started = self.decision_task_started(scheduled);
        let completed = self.decision_task_completed(scheduled, started);
        (scheduled, started, completed)
    }

    /// Scheduled and started, the shape of the task currently being handed out.
    pub fn live_decision_task(&mut self) -> i64 {
        let scheduled = self.decision_task_scheduled();
        self.decision_task_started(scheduled)
    }

    // ==== Activities ====

    pub fn activity_task_scheduled(&mut self, activity_id: &str, activity_type: &str) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::ActivityTaskScheduled(
            ActivityTaskScheduledEventAttributes {
                activity_id: activity_id.to_string(),
                activity_type: activity_type.to_string(),
                task_list: "default".to_string(),
                decision_task_completed_event_id: completed,
                ..Default::default()
            },
        ))
    }

    pub fn activity_task_started(&mut self, scheduled_event_id: i64) -> i64 {
        self.add(EventAttributes::ActivityTaskStarted(
            ActivityTaskStartedEventAttributes {
                scheduled_event_id,
                ..Default::default()
            },
        ))
    }

    pub fn activity_task_completed(
        &mut self,
        scheduled_event_id: i64,
        started_event_id: i64,
        result: Option<Payload>,
    ) -> i64 {
        self.add(EventAttributes::ActivityTaskCompleted(
            ActivityTaskCompletedEventAttributes {
                scheduled_event_id,
                started_event_id,
                result,
                identity: String::new(),
            },
        ))
    }

    pub fn activity_task_failed(
        &mut self,
        scheduled_event_id: i64,
        started_event_id: i64,
        reason: &str,
        details: Option<Payload>,
    ) -> i64 {
        self.add(EventAttributes::ActivityTaskFailed(
            ActivityTaskFailedEventAttributes {
                scheduled_event_id,
                started_event_id,
                reason: reason.to_string(),
                details,
                identity: String::new(),
            },
        ))
    }

    pub fn activity_task_timed_out(
        &mut self,
        scheduled_event_id: i64,
        started_event_id: i64,
        timeout_type: TimeoutType,
    ) -> i64 {
        self.add(EventAttributes::ActivityTaskTimedOut(
            ActivityTaskTimedOutEventAttributes {
                scheduled_event_id,
                started_event_id,
                timeout_type,
                details: None,
            },
        ))
    }

    pub fn activity_task_cancel_requested(&mut self, activity_id: &str) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::ActivityTaskCancelRequested(
            ActivityTaskCancelRequestedEventAttributes {
                activity_id: activity_id.to_string(),
                decision_task_completed_event_id: completed,
            },
        ))
    }

    pub fn request_cancel_activity_task_failed(&mut self, activity_id: &str, cause: &str) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::RequestCancelActivityTaskFailed(
            RequestCancelActivityTaskFailedEventAttributes {
                activity_id: activity_id.to_string(),
                cause: cause.to_string(),
                decision_task_completed_event_id: completed,
            },
        ))
    }

    pub fn activity_task_canceled(&mut self, scheduled_event_id: i64, started_event_id: i64) -> i64 {
        self.add(EventAttributes::ActivityTaskCanceled(
            ActivityTaskCanceledEventAttributes {
                scheduled_event_id,
                started_event_id,
                ..Default::default()
            },
        ))
    }

    // ==== Timers ====

    pub fn timer_started(&mut self, timer_id: &str, start_to_fire_timeout_seconds: i64) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::TimerStarted(TimerStartedEventAttributes {
            timer_id: timer_id.to_string(),
            start_to_fire_timeout_seconds,
            decision_task_completed_event_id: completed,
        }))
    }

    pub fn timer_fired(&mut self, timer_id: &str, started_event_id: i64) -> i64 {
        self.add(EventAttributes::TimerFired(TimerFiredEventAttributes {
            timer_id: timer_id.to_string(),
            started_event_id,
        }))
    }

    pub fn timer_canceled(&mut self, timer_id: &str, started_event_id: i64) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::TimerCanceled(TimerCanceledEventAttributes {
            timer_id: timer_id.to_string(),
            started_event_id,
            decision_task_completed_event_id: completed,
            identity: String::new(),
        }))
    }

    pub fn cancel_timer_failed(&mut self, timer_id: &str, cause: &str) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::CancelTimerFailed(
            CancelTimerFailedEventAttributes {
                timer_id: timer_id.to_string(),
                cause: cause.to_string(),
                decision_task_completed_event_id: completed,
                identity: String::new(),
            },
        ))
    }

    // ==== Child workflows ====

    pub fn start_child_workflow_initiated(&mut self, workflow_id: &str, workflow_type: &str) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::StartChildWorkflowExecutionInitiated(
            StartChildWorkflowExecutionInitiatedEventAttributes {
                workflow_id: workflow_id.to_string(),
                workflow_type: workflow_type.to_string(),
                decision_task_completed_event_id: completed,
                ..Default::default()
            },
        ))
    }

    pub fn start_child_workflow_failed(
        &mut self,
        workflow_id: &str,
        initiated_event_id: i64,
        cause: &str,
    ) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::StartChildWorkflowExecutionFailed(
            StartChildWorkflowExecutionFailedEventAttributes {
                workflow_id: workflow_id.to_string(),
                cause: cause.to_string(),
                initiated_event_id,
                decision_task_completed_event_id: completed,
                ..Default::default()
            },
        ))
    }

    pub fn child_workflow_started(&mut self, workflow_id: &str, run_id: &str, initiated_event_id: i64) -> i64 {
        self.add(EventAttributes::ChildWorkflowExecutionStarted(
            ChildWorkflowExecutionStartedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, run_id),
                initiated_event_id,
                ..Default::default()
            },
        ))
    }

    pub fn child_workflow_completed(
        &mut self,
        workflow_id: &str,
        initiated_event_id: i64,
        started_event_id: i64,
        result: Option<Payload>,
    ) -> i64 {
        self.add(EventAttributes::ChildWorkflowExecutionCompleted(
            ChildWorkflowExecutionCompletedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                initiated_event_id,
                started_event_id,
                result,
            },
        ))
    }

    pub fn child_workflow_failed(
        &mut self,
        workflow_id: &str,
        initiated_event_id: i64,
        started_event_id: i64,
        reason: &str,
    ) -> i64 {
        self.add(EventAttributes::ChildWorkflowExecutionFailed(
            ChildWorkflowExecutionFailedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                initiated_event_id,
                started_event_id,
                reason: reason.to_string(),
                details: None,
            },
        ))
    }

    pub fn child_workflow_timed_out(
        &mut self,
        workflow_id: &str,
        initiated_event_id: i64,
        started_event_id: i64,
    ) -> i64 {
        self.add(EventAttributes::ChildWorkflowExecutionTimedOut(
            ChildWorkflowExecutionTimedOutEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                initiated_event_id,
                started_event_id,
                timeout_type: TimeoutType::StartToClose,
            },
        ))
    }

    pub fn child_workflow_canceled(
        &mut self,
        workflow_id: &str,
        initiated_event_id: i64,
        started_event_id: i64,
    ) -> i64 {
        self.add(EventAttributes::ChildWorkflowExecutionCanceled(
            ChildWorkflowExecutionCanceledEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                initiated_event_id,
                started_event_id,
                details: None,
            },
        ))
    }

    pub fn child_workflow_terminated(
        &mut self,
        workflow_id: &str,
        initiated_event_id: i64,
        started_event_id: i64,
    ) -> i64 {
        self.add(EventAttributes::ChildWorkflowExecutionTerminated(
            ChildWorkflowExecutionTerminatedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                initiated_event_id,
                started_event_id,
            },
        ))
    }

    // ==== External workflows ====

    pub fn request_cancel_external_initiated(
        &mut self,
        workflow_id: &str,
        control: &str,
        child_workflow_only: bool,
    ) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(
            RequestCancelExternalWorkflowExecutionInitiatedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                control: control.to_string(),
                child_workflow_only,
                decision_task_completed_event_id: completed,
                ..Default::default()
            },
        ))
    }

    pub fn request_cancel_external_failed(
        &mut self,
        workflow_id: &str,
        initiated_event_id: i64,
        cause: &str,
    ) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::RequestCancelExternalWorkflowExecutionFailed(
            RequestCancelExternalWorkflowExecutionFailedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                cause: cause.to_string(),
                initiated_event_id,
                decision_task_completed_event_id: completed,
                ..Default::default()
            },
        ))
    }

    pub fn external_workflow_cancel_requested(&mut self, workflow_id: &str, initiated_event_id: i64) -> i64 {
        self.add(EventAttributes::ExternalWorkflowExecutionCancelRequested(
            ExternalWorkflowExecutionCancelRequestedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                initiated_event_id,
                ..Default::default()
            },
        ))
    }

    pub fn signal_external_initiated(&mut self, workflow_id: &str, signal_name: &str, control: &str) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::SignalExternalWorkflowExecutionInitiated(
            SignalExternalWorkflowExecutionInitiatedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                signal_name: signal_name.to_string(),
                control: control.to_string(),
                decision_task_completed_event_id: completed,
                ..Default::default()
            },
        ))
    }

    pub fn signal_external_failed(&mut self, workflow_id: &str, initiated_event_id: i64, cause: &str) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::SignalExternalWorkflowExecutionFailed(
            SignalExternalWorkflowExecutionFailedEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                cause: cause.to_string(),
                initiated_event_id,
                decision_task_completed_event_id: completed,
                ..Default::default()
            },
        ))
    }

    pub fn external_workflow_signaled(&mut self, workflow_id: &str, initiated_event_id: i64) -> i64 {
        self.add(EventAttributes::ExternalWorkflowExecutionSignaled(
            ExternalWorkflowExecutionSignaledEventAttributes {
                workflow_execution: WorkflowExecution::new(workflow_id, ""),
                initiated_event_id,
                ..Default::default()
            },
        ))
    }

    // ==== Markers and search attributes ====

    pub fn marker_recorded(&mut self, marker_name: &str, marker_id: &str, details: Option<Payload>) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::MarkerRecorded(MarkerRecordedEventAttributes {
            marker_name: marker_name.to_string(),
            marker_id: marker_id.to_string(),
            details,
            decision_task_completed_event_id: completed,
        }))
    }

    pub fn upsert_search_attributes(&mut self, search_attributes: BTreeMap<String, Payload>) -> i64 {
        let completed = self.last_completed_task();
        self.add(EventAttributes::UpsertWorkflowSearchAttributes(
            UpsertWorkflowSearchAttributesEventAttributes {
                search_attributes,
                decision_task_completed_event_id: completed,
            },
        ))
    }
}

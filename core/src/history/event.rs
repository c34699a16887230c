//! History events
//!
//! A workflow run's history is an append-only log of [`HistoryEvent`]s written
//! by the orchestrator. Every event carries exactly one variant of the closed
//! [`EventAttributes`] union; nothing in the replay core looks at attributes by
//! name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque encoded bytes. Only the payload codec interprets them.
pub type Payload = Vec<u8>;

/// Identifies one run of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl std::fmt::Display for WorkflowExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.workflow_id, self.run_id)
    }
}

/// Which timeout fired for an activity, child workflow or decision task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutType {
    #[default]
    StartToClose,
    ScheduleToStart,
    ScheduleToClose,
    Heartbeat,
}

impl TimeoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutType::StartToClose => "START_TO_CLOSE",
            TimeoutType::ScheduleToStart => "SCHEDULE_TO_START",
            TimeoutType::ScheduleToClose => "SCHEDULE_TO_CLOSE",
            TimeoutType::Heartbeat => "HEARTBEAT",
        }
    }
}

/// Field-less tag of an [`EventAttributes`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionCancelRequested,
    WorkflowExecutionSignaled,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskFailed,
    DecisionTaskTimedOut,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCancelRequested,
    RequestCancelActivityTaskFailed,
    ActivityTaskCanceled,
    TimerStarted,
    TimerFired,
    TimerCanceled,
    CancelTimerFailed,
    StartChildWorkflowExecutionInitiated,
    StartChildWorkflowExecutionFailed,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionTimedOut,
    ChildWorkflowExecutionCanceled,
    ChildWorkflowExecutionTerminated,
    RequestCancelExternalWorkflowExecutionInitiated,
    RequestCancelExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionCancelRequested,
    SignalExternalWorkflowExecutionInitiated,
    SignalExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionSignaled,
    MarkerRecorded,
    UpsertWorkflowSearchAttributes,
}

impl EventType {
    /// Opens a decision event batch.
    pub fn is_decision_task_started(&self) -> bool {
        matches!(self, EventType::DecisionTaskStarted)
    }

    /// Closes a decision event batch.
    pub fn is_decision_task_closing(&self) -> bool {
        matches!(
            self,
            EventType::DecisionTaskCompleted
                | EventType::DecisionTaskFailed
                | EventType::DecisionTaskTimedOut
        )
    }

    /// Events the orchestrator appends as the direct result of a decision
    /// returned in the preceding `DecisionTaskCompleted`.
    pub fn is_decision_event(&self) -> bool {
        matches!(
            self,
            EventType::ActivityTaskScheduled
                | EventType::ActivityTaskCancelRequested
                | EventType::RequestCancelActivityTaskFailed
                | EventType::TimerStarted
                | EventType::TimerCanceled
                | EventType::CancelTimerFailed
                | EventType::StartChildWorkflowExecutionInitiated
                | EventType::RequestCancelExternalWorkflowExecutionInitiated
                | EventType::SignalExternalWorkflowExecutionInitiated
                | EventType::MarkerRecorded
                | EventType::UpsertWorkflowSearchAttributes
                | EventType::WorkflowExecutionCompleted
                | EventType::WorkflowExecutionFailed
        )
    }
}

/// One immutable record of a workflow run's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub event_id: i64,
    pub timestamp: DateTime<Utc>,
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    pub fn new(event_id: i64, timestamp: DateTime<Utc>, attributes: EventAttributes) -> Self {
        Self {
            event_id,
            timestamp,
            attributes,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.attributes.event_type()
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.attributes, EventAttributes::MarkerRecorded(_))
    }
}

/// Variant payloads of a history event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAttributes {
    WorkflowExecutionStarted(WorkflowExecutionStartedEventAttributes),
    WorkflowExecutionCompleted(WorkflowExecutionCompletedEventAttributes),
    WorkflowExecutionFailed(WorkflowExecutionFailedEventAttributes),
    WorkflowExecutionCancelRequested(WorkflowExecutionCancelRequestedEventAttributes),
    WorkflowExecutionSignaled(WorkflowExecutionSignaledEventAttributes),
    DecisionTaskScheduled(DecisionTaskScheduledEventAttributes),
    DecisionTaskStarted(DecisionTaskStartedEventAttributes),
    DecisionTaskCompleted(DecisionTaskCompletedEventAttributes),
    DecisionTaskFailed(DecisionTaskFailedEventAttributes),
    DecisionTaskTimedOut(DecisionTaskTimedOutEventAttributes),
    ActivityTaskScheduled(ActivityTaskScheduledEventAttributes),
    ActivityTaskStarted(ActivityTaskStartedEventAttributes),
    ActivityTaskCompleted(ActivityTaskCompletedEventAttributes),
    ActivityTaskFailed(ActivityTaskFailedEventAttributes),
    ActivityTaskTimedOut(ActivityTaskTimedOutEventAttributes),
    ActivityTaskCancelRequested(ActivityTaskCancelRequestedEventAttributes),
    RequestCancelActivityTaskFailed(RequestCancelActivityTaskFailedEventAttributes),
    ActivityTaskCanceled(ActivityTaskCanceledEventAttributes),
    TimerStarted(TimerStartedEventAttributes),
    TimerFired(TimerFiredEventAttributes),
    TimerCanceled(TimerCanceledEventAttributes),
    CancelTimerFailed(CancelTimerFailedEventAttributes),
    StartChildWorkflowExecutionInitiated(StartChildWorkflowExecutionInitiatedEventAttributes),
    StartChildWorkflowExecutionFailed(StartChildWorkflowExecutionFailedEventAttributes),
    ChildWorkflowExecutionStarted(ChildWorkflowExecutionStartedEventAttributes),
    ChildWorkflowExecutionCompleted(ChildWorkflowExecutionCompletedEventAttributes),
    ChildWorkflowExecutionFailed(ChildWorkflowExecutionFailedEventAttributes),
    ChildWorkflowExecutionTimedOut(ChildWorkflowExecutionTimedOutEventAttributes),
    ChildWorkflowExecutionCanceled(ChildWorkflowExecutionCanceledEventAttributes),
    ChildWorkflowExecutionTerminated(ChildWorkflowExecutionTerminatedEventAttributes),
    RequestCancelExternalWorkflowExecutionInitiated(
        RequestCancelExternalWorkflowExecutionInitiatedEventAttributes,
    ),
    RequestCancelExternalWorkflowExecutionFailed(
        RequestCancelExternalWorkflowExecutionFailedEventAttributes,
    ),
    ExternalWorkflowExecutionCancelRequested(ExternalWorkflowExecutionCancelRequestedEventAttributes),
    SignalExternalWorkflowExecutionInitiated(SignalExternalWorkflowExecutionInitiatedEventAttributes),
    SignalExternalWorkflowExecutionFailed(SignalExternalWorkflowExecutionFailedEventAttributes),
    ExternalWorkflowExecutionSignaled(ExternalWorkflowExecutionSignaledEventAttributes),
    MarkerRecorded(MarkerRecordedEventAttributes),
    UpsertWorkflowSearchAttributes(UpsertWorkflowSearchAttributesEventAttributes),
}

impl EventAttributes {
    pub fn event_type(&self) -> EventType {
        use EventAttributes as A;
        match self {
            A::WorkflowExecutionStarted(_) => EventType::WorkflowExecutionStarted,
            A::WorkflowExecutionCompleted(_) => EventType::WorkflowExecutionCompleted,
            A::WorkflowExecutionFailed(_) => EventType::WorkflowExecutionFailed,
            A::WorkflowExecutionCancelRequested(_) => EventType::WorkflowExecutionCancelRequested,
            A::WorkflowExecutionSignaled(_) => EventType::WorkflowExecutionSignaled,
            A::DecisionTaskScheduled(_) => EventType::DecisionTaskScheduled,
            A::DecisionTaskStarted(_) => EventType::DecisionTaskStarted,
            A::DecisionTaskCompleted(_) => EventType::DecisionTaskCompleted,
            A::DecisionTaskFailed(_) => EventType::DecisionTaskFailed,
            A::DecisionTaskTimedOut(_) => EventType::DecisionTaskTimedOut,
            A::ActivityTaskScheduled(_) => EventType::ActivityTaskScheduled,
            A::ActivityTaskStarted(_) => EventType::ActivityTaskStarted,
            A::ActivityTaskCompleted(_) => EventType::ActivityTaskCompleted,
            A::ActivityTaskFailed(_) => EventType::ActivityTaskFailed,
            A::ActivityTaskTimedOut(_) => EventType::ActivityTaskTimedOut,
            A::ActivityTaskCancelRequested(_) => EventType::ActivityTaskCancelRequested,
            A::RequestCancelActivityTaskFailed(_) => EventType::RequestCancelActivityTaskFailed,
            A::ActivityTaskCanceled(_) => EventType::ActivityTaskCanceled,
            A::TimerStarted(_) => EventType::TimerStarted,
            A::TimerFired(_) => EventType::TimerFired,
            A::TimerCanceled(_) => EventType::TimerCanceled,
            A::CancelTimerFailed(_) => EventType::CancelTimerFailed,
            A::StartChildWorkflowExecutionInitiated(_) => {
                EventType::StartChildWorkflowExecutionInitiated
            }
            A::StartChildWorkflowExecutionFailed(_) => EventType::StartChildWorkflowExecutionFailed,
            A::ChildWorkflowExecutionStarted(_) => EventType::ChildWorkflowExecutionStarted,
            A::ChildWorkflowExecutionCompleted(_) => EventType::ChildWorkflowExecutionCompleted,
            A::ChildWorkflowExecutionFailed(_) => EventType::ChildWorkflowExecutionFailed,
            A::ChildWorkflowExecutionTimedOut(_) => EventType::ChildWorkflowExecutionTimedOut,
            A::ChildWorkflowExecutionCanceled(_) => EventType::ChildWorkflowExecutionCanceled,
            A::ChildWorkflowExecutionTerminated(_) => EventType::ChildWorkflowExecutionTerminated,
            A::RequestCancelExternalWorkflowExecutionInitiated(_) => {
                EventType::RequestCancelExternalWorkflowExecutionInitiated
            }
            A::RequestCancelExternalWorkflowExecutionFailed(_) => {
                EventType::RequestCancelExternalWorkflowExecutionFailed
            }
            A::ExternalWorkflowExecutionCancelRequested(_) => {
                EventType::ExternalWorkflowExecutionCancelRequested
            }
            A::SignalExternalWorkflowExecutionInitiated(_) => {
                EventType::SignalExternalWorkflowExecutionInitiated
            }
            A::SignalExternalWorkflowExecutionFailed(_) => {
                EventType::SignalExternalWorkflowExecutionFailed
            }
            A::ExternalWorkflowExecutionSignaled(_) => EventType::ExternalWorkflowExecutionSignaled,
            A::MarkerRecorded(_) => EventType::MarkerRecorded,
            A::UpsertWorkflowSearchAttributes(_) => EventType::UpsertWorkflowSearchAttributes,
        }
    }
}

// ==== Workflow execution ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExecutionStartedEventAttributes {
    pub workflow_type: String,
    pub task_list: String,
    pub input: Option<Payload>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub parent_workflow_execution: Option<WorkflowExecution>,
    pub attempt: i32,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExecutionCompletedEventAttributes {
    pub result: Option<Payload>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExecutionFailedEventAttributes {
    pub reason: String,
    pub details: Option<Payload>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExecutionCancelRequestedEventAttributes {
    pub cause: String,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExecutionSignaledEventAttributes {
    pub signal_name: String,
    pub input: Option<Payload>,
    pub identity: String,
}

// ==== Decision tasks ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTaskScheduledEventAttributes {
    pub task_list: String,
    pub start_to_close_timeout_seconds: i32,
    pub attempt: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTaskStartedEventAttributes {
    pub scheduled_event_id: i64,
    pub identity: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTaskCompletedEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub identity: String,
    pub binary_checksum: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTaskFailedEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub cause: String,
    pub details: Option<Payload>,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTaskTimedOutEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub timeout_type: TimeoutType,
}

// ==== Activities ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskScheduledEventAttributes {
    pub activity_id: String,
    pub activity_type: String,
    pub domain: Option<String>,
    pub task_list: String,
    pub input: Option<Payload>,
    pub schedule_to_close_timeout_seconds: i32,
    pub schedule_to_start_timeout_seconds: i32,
    pub start_to_close_timeout_seconds: i32,
    pub heartbeat_timeout_seconds: i32,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskStartedEventAttributes {
    pub scheduled_event_id: i64,
    pub identity: String,
    pub request_id: String,
    pub attempt: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskCompletedEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub result: Option<Payload>,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskFailedEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub reason: String,
    pub details: Option<Payload>,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskTimedOutEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub timeout_type: TimeoutType,
    pub details: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskCancelRequestedEventAttributes {
    pub activity_id: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestCancelActivityTaskFailedEventAttributes {
    pub activity_id: String,
    pub cause: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityTaskCanceledEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub latest_cancel_requested_event_id: i64,
    pub details: Option<Payload>,
    pub identity: String,
}

// ==== Timers ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerStartedEventAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout_seconds: i64,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerFiredEventAttributes {
    pub timer_id: String,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerCanceledEventAttributes {
    pub timer_id: String,
    pub started_event_id: i64,
    pub decision_task_completed_event_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancelTimerFailedEventAttributes {
    pub timer_id: String,
    pub cause: String,
    pub decision_task_completed_event_id: i64,
    pub identity: String,
}

// ==== Child workflows ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartChildWorkflowExecutionInitiatedEventAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_list: String,
    pub input: Option<Payload>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartChildWorkflowExecutionFailedEventAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: String,
    pub cause: String,
    pub initiated_event_id: i64,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionStartedEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: String,
    pub initiated_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionCompletedEventAttributes {
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
    pub result: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionFailedEventAttributes {
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
    pub reason: String,
    pub details: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionTimedOutEventAttributes {
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
    pub timeout_type: TimeoutType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionCanceledEventAttributes {
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
    pub details: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildWorkflowExecutionTerminatedEventAttributes {
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

// ==== External workflows ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestCancelExternalWorkflowExecutionInitiatedEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub control: String,
    pub child_workflow_only: bool,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestCancelExternalWorkflowExecutionFailedEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub cause: String,
    pub initiated_event_id: i64,
    pub control: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalWorkflowExecutionCancelRequestedEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalExternalWorkflowExecutionInitiatedEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Option<Payload>,
    pub control: String,
    pub child_workflow_only: bool,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalExternalWorkflowExecutionFailedEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub cause: String,
    pub initiated_event_id: i64,
    pub control: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalWorkflowExecutionSignaledEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
    pub control: String,
}

// ==== Markers and search attributes ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerRecordedEventAttributes {
    pub marker_name: String,
    pub marker_id: String,
    pub details: Option<Payload>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsertWorkflowSearchAttributesEventAttributes {
    pub search_attributes: BTreeMap<String, Payload>,
    pub decision_task_completed_event_id: i64,
}

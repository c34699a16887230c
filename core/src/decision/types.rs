//! Decisions and the identifiers of the state machines that emit them.

use crate::history::{Payload, WorkflowExecution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of entity a decision state machine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionTarget {
    Activity,
    Timer,
    ChildWorkflow,
    Marker,
    UpsertSearchAttributes,
    CancelExternalWorkflow,
    SignalExternalWorkflow,
}

/// Names one state machine for the lifetime of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionId {
    pub target: DecisionTarget,
    pub id: String,
}

impl DecisionId {
    pub fn new(target: DecisionTarget, id: impl Into<String>) -> Self {
        Self {
            target,
            id: id.into(),
        }
    }

    pub fn activity(id: impl Into<String>) -> Self {
        Self::new(DecisionTarget::Activity, id)
    }

    pub fn timer(id: impl Into<String>) -> Self {
        Self::new(DecisionTarget::Timer, id)
    }

    pub fn child_workflow(id: impl Into<String>) -> Self {
        Self::new(DecisionTarget::ChildWorkflow, id)
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.target, self.id)
    }
}

// ==== Decision attributes ====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleActivityTaskDecisionAttributes {
    pub activity_id: String,
    pub activity_type: String,
    pub domain: Option<String>,
    pub task_list: String,
    pub input: Option<Payload>,
    pub schedule_to_close_timeout_seconds: i32,
    pub schedule_to_start_timeout_seconds: i32,
    pub start_to_close_timeout_seconds: i32,
    pub heartbeat_timeout_seconds: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerDecisionAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChildWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_list: String,
    pub input: Option<Payload>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCancelExternalWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: String,
    pub control: String,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalExternalWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Option<Payload>,
    pub control: String,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMarkerDecisionAttributes {
    pub marker_name: String,
    pub marker_id: String,
    pub details: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertWorkflowSearchAttributesDecisionAttributes {
    pub search_attributes: BTreeMap<String, Payload>,
}

/// An intent sent back to the orchestrator when a decision task completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decisionType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    ScheduleActivityTask(ScheduleActivityTaskDecisionAttributes),
    #[serde(rename_all = "camelCase")]
    RequestCancelActivityTask {
        activity_id: String,
    },
    StartTimer(StartTimerDecisionAttributes),
    #[serde(rename_all = "camelCase")]
    CancelTimer {
        timer_id: String,
    },
    StartChildWorkflowExecution(StartChildWorkflowExecutionDecisionAttributes),
    RequestCancelExternalWorkflowExecution(RequestCancelExternalWorkflowExecutionDecisionAttributes),
    SignalExternalWorkflowExecution(SignalExternalWorkflowExecutionDecisionAttributes),
    RecordMarker(RecordMarkerDecisionAttributes),
    UpsertWorkflowSearchAttributes(UpsertWorkflowSearchAttributesDecisionAttributes),
    #[serde(rename_all = "camelCase")]
    CompleteWorkflowExecution {
        result: Option<Payload>,
    },
    #[serde(rename_all = "camelCase")]
    FailWorkflowExecution {
        reason: String,
        details: Option<Payload>,
    },
}

impl Decision {
    pub fn decision_type(&self) -> &'static str {
        match self {
            Decision::ScheduleActivityTask(_) => "ScheduleActivityTask",
            Decision::RequestCancelActivityTask { .. } => "RequestCancelActivityTask",
            Decision::StartTimer(_) => "StartTimer",
            Decision::CancelTimer { .. } => "CancelTimer",
            Decision::StartChildWorkflowExecution(_) => "StartChildWorkflowExecution",
            Decision::RequestCancelExternalWorkflowExecution(_) => {
                "RequestCancelExternalWorkflowExecution"
            }
            Decision::SignalExternalWorkflowExecution(_) => "SignalExternalWorkflowExecution",
            Decision::RecordMarker(_) => "RecordMarker",
            Decision::UpsertWorkflowSearchAttributes(_) => "UpsertWorkflowSearchAttributes",
            Decision::CompleteWorkflowExecution { .. } => "CompleteWorkflowExecution",
            Decision::FailWorkflowExecution { .. } => "FailWorkflowExecution",
        }
    }

    /// Whether this decision closes the workflow run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Decision::CompleteWorkflowExecution { .. } | Decision::FailWorkflowExecution { .. }
        )
    }
}

// ==== Outcomes ====

/// Reason and details of a failed decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub reason: String,
    pub details: Option<Payload>,
}

impl Failure {
    pub fn new(reason: impl Into<String>, details: Option<Payload>) -> Self {
        Self {
            reason: reason.into(),
            details,
        }
    }
}

/// How the orchestrator resolved a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Completed(Option<Payload>),
    Failed(Failure),
    Canceled(Option<Payload>),
}

impl Outcome {
    pub fn failed(reason: impl Into<String>, details: Option<Payload>) -> Self {
        Outcome::Failed(Failure::new(reason, details))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled(_))
    }
}

/// An outcome together with the machine it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub id: DecisionId,
    pub outcome: Outcome,
}

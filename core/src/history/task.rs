//! What the task source and the history source hand to a decider.

use super::event::{HistoryEvent, WorkflowExecution};
use serde::{Deserialize, Serialize};

/// One poll-and-respond unit of work for a workflow run.
///
/// `history` is the inline portion of the run's history. When
/// `next_page_token` is set the rest must be paged in before the task can be
/// processed. `started_event_id` is the id of this task's own
/// `DecisionTaskStarted` event and separates replayed batches from the live one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionTask {
    pub task_token: Vec<u8>,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: String,
    pub history: Vec<HistoryEvent>,
    pub started_event_id: i64,
    pub previous_started_event_id: i64,
    pub next_page_token: Option<Vec<u8>>,
    pub attempt: i64,
}

impl DecisionTask {
    pub fn new(
        task_token: impl Into<Vec<u8>>,
        workflow_execution: WorkflowExecution,
        workflow_type: impl Into<String>,
        history: Vec<HistoryEvent>,
        started_event_id: i64,
    ) -> Self {
        Self {
            task_token: task_token.into(),
            workflow_execution,
            workflow_type: workflow_type.into(),
            history,
            started_event_id,
            ..Default::default()
        }
    }

    pub fn with_next_page_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }

    pub fn with_previous_started_event_id(mut self, event_id: i64) -> Self {
        self.previous_started_event_id = event_id;
        self
    }

    pub fn with_attempt(mut self, attempt: i64) -> Self {
        self.attempt = attempt;
        self
    }

    /// Whether the inline history starts at the first event of the run.
    pub fn has_full_history(&self) -> bool {
        self.history.first().map(|e| e.event_id == 1).unwrap_or(false)
    }
}

/// One page returned by the history source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryPage {
    pub events: Vec<HistoryEvent>,
    pub next_page_token: Option<Vec<u8>>,
}

impl HistoryPage {
    pub fn new(events: Vec<HistoryEvent>, next_page_token: Option<Vec<u8>>) -> Self {
        Self {
            events,
            next_page_token,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }
}

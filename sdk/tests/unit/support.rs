//! In-memory collaborators and history helpers shared by the tests.

use async_trait::async_trait;
use cadence_core::{DecisionTask, HistoryBuilder, HistoryEvent, HistoryPage, Payload, WorkflowExecution};
use cadence_sdk::{
    CadenceError, CompletedDecisionTask, DecisionSink, FailedDecisionTask, HistorySource, Result,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const WORKFLOW_ID: &str = "order-42";
pub const RUN_ID: &str = "run-1";

pub fn execution() -> WorkflowExecution {
    WorkflowExecution::new(WORKFLOW_ID, RUN_ID)
}

/// Encode a value the way `JsonCodec` does.
pub fn payload<T: Serialize>(value: T) -> Payload {
    serde_json::to_vec(&[serde_json::to_value(value).unwrap()]).unwrap()
}

pub fn task(workflow_type: &str, history: Vec<HistoryEvent>, started_event_id: i64) -> DecisionTask {
    DecisionTask::new(
        b"task-token".to_vec(),
        execution(),
        workflow_type,
        history,
        started_event_id,
    )
}

/// Task carrying the builder's whole history.
pub fn full_task(workflow_type: &str, history: &HistoryBuilder, started_event_id: i64) -> DecisionTask {
    task(workflow_type, history.build(), started_event_id)
}

/// Task carrying only the events after `after_event_id`.
pub fn sticky_task(
    workflow_type: &str,
    history: &HistoryBuilder,
    after_event_id: i64,
    started_event_id: i64,
) -> DecisionTask {
    let events = history
        .events()
        .iter()
        .filter(|e| e.event_id > after_event_id)
        .cloned()
        .collect();
    task(workflow_type, events, started_event_id).with_previous_started_event_id(after_event_id)
}

// ==== History source ====

/// Serves pages registered under their tokens.
#[derive(Default)]
pub struct InMemoryHistory {
    pages: Mutex<HashMap<Vec<u8>, HistoryPage>>,
    requests: AtomicUsize,
    fail: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, token: &[u8], events: Vec<HistoryEvent>, next: Option<&[u8]>) {
        self.pages
            .lock()
            .insert(token.to_vec(), HistoryPage::new(events, next.map(<[u8]>::to_vec)));
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail.lock() = Some(message.to_string());
    }

    pub fn delay_by(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistorySource for InMemoryHistory {
    async fn get_more_history(
        &self,
        _execution: &WorkflowExecution,
        next_page_token: &[u8],
        _page_size: i32,
    ) -> Result<HistoryPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.fail.lock().clone() {
            return Err(CadenceError::HistoryUnavailable(message));
        }
        self.pages
            .lock()
            .get(next_page_token)
            .cloned()
            .ok_or_else(|| CadenceError::HistoryUnavailable("unknown page token".to_string()))
    }
}

// ==== Decision sink ====

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Completed(CompletedDecisionTask),
    Failed(FailedDecisionTask),
}

/// Records every response in order.
#[derive(Default)]
pub struct RecordingSink {
    responses: Mutex<Vec<Response>>,
    reject_completed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `respond_completed` call fail.
    pub fn reject_completed(&self) {
        self.reject_completed.store(true, Ordering::SeqCst);
    }

    pub fn responses(&self) -> Vec<Response> {
        self.responses.lock().clone()
    }

    pub fn last_completed(&self) -> CompletedDecisionTask {
        match self.responses.lock().last() {
            Some(Response::Completed(response)) => response.clone(),
            other => panic!("expected a completed response, got {:?}", other),
        }
    }

    pub fn last_failed(&self) -> FailedDecisionTask {
        match self.responses.lock().last() {
            Some(Response::Failed(response)) => response.clone(),
            other => panic!("expected a failed response, got {:?}", other),
        }
    }
}

#[async_trait]
impl DecisionSink for RecordingSink {
    async fn respond_completed(&self, response: CompletedDecisionTask) -> Result<()> {
        if self.reject_completed.load(Ordering::SeqCst) {
            return Err(CadenceError::Other("task token expired".to_string()));
        }
        self.responses.lock().push(Response::Completed(response));
        Ok(())
    }

    async fn respond_failed(&self, response: FailedDecisionTask) -> Result<()> {
        self.responses.lock().push(Response::Failed(response));
        Ok(())
    }
}

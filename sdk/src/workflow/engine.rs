//! WorkflowEngine - Drives one workflow run through its decision tasks
//!
//! For every decision task the engine replays the run's history one decision
//! batch at a time: it applies the batch's events to the context (resolving
//! the futures workflow code waits on), lets the scheduler run the workflow
//! code once, and finally collects the decisions that code produced. An
//! engine is meant to be kept between decision tasks of the same run; it
//! skips events it has already applied. When history shows that the last
//! task it answered never took effect, it starts over from the full history.

use crate::common::codec::{encode_value, PayloadCodec};
use crate::error::{CadenceError, Result};
use crate::telemetry::{names, MetricsSink, RecordingTimer};
use crate::workflow::context::WorkflowContext;
use crate::workflow::definition::{WorkflowFn, WorkflowInfo};
use crate::workflow::scheduler::{DeterministicScheduler, JoinHandle};
use cadence_core::{
    CoreError, Decision, DecisionEvents, DecisionEventsIterator, DecisionTask, EventAttributes,
    EventType, HistoryEvent, NextBatch, Outcome, Payload,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decisions produced for one decision task.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTaskCompletion {
    pub decisions: Vec<Decision>,
    /// True when the decisions close the workflow run.
    pub workflow_completed: bool,
}

/// Replay engine for a single workflow run.
pub struct WorkflowEngine {
    info: Arc<WorkflowInfo>,
    workflow_fn: WorkflowFn,
    codec: Arc<dyn PayloadCodec>,
    metrics: Arc<dyn MetricsSink>,
    scheduler: DeterministicScheduler<Outcome>,
    context: WorkflowContext,
    root: Option<JoinHandle<Result<Value>>>,
    completion_emitted: bool,
    last_processed_event_id: i64,
    /// Started id of the last task answered live; zero before the first.
    last_live_started_event_id: i64,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("info", &self.info)
            .field("completion_emitted", &self.completion_emitted)
            .field("last_processed_event_id", &self.last_processed_event_id)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(
        info: WorkflowInfo,
        workflow_fn: WorkflowFn,
        codec: Arc<dyn PayloadCodec>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let info = Arc::new(info);
        let scheduler = DeterministicScheduler::new();
        let context = WorkflowContext::new(Arc::clone(&info), scheduler.handle(), Arc::clone(&codec));
        Self {
            info,
            workflow_fn,
            codec,
            metrics,
            scheduler,
            context,
            root: None,
            completion_emitted: false,
            last_processed_event_id: 0,
            last_live_started_event_id: 0,
        }
    }

    pub fn workflow_info(&self) -> &WorkflowInfo {
        &self.info
    }

    /// Whether a terminal decision has been produced.
    pub fn is_completed(&self) -> bool {
        self.completion_emitted
    }

    pub fn last_processed_event_id(&self) -> i64 {
        self.last_processed_event_id
    }

    /// Replay the task's history and return the decisions to send back.
    ///
    /// On error nothing is returned and the engine must be discarded: its
    /// state no longer matches any prefix of history.
    pub fn process_decision_task(&mut self, task: &DecisionTask) -> Result<DecisionTaskCompletion> {
        let timer = RecordingTimer::start(names::DECISION_TASK_REPLAY_LATENCY);
        if self.is_stale_for(task) {
            if !task.has_full_history() {
                return Err(CadenceError::StaleState(format!(
                    "last answered task {} of {} never took effect",
                    self.last_live_started_event_id, self.info.workflow_execution
                )));
            }
            info!(
                workflow_id = %self.info.workflow_execution.workflow_id,
                run_id = %self.info.workflow_execution.run_id,
                last_live_started_event_id = self.last_live_started_event_id,
                "Replaying from full history; last answered task never took effect"
            );
            self.reset();
        }

        let mut batches =
            DecisionEventsIterator::from_history(task.history.clone(), task.started_event_id)?;

        loop {
            match batches.poll() {
                NextBatch::Ready(batch) => self.apply_batch(&batch)?,
                NextBatch::Incomplete => {
                    debug!(
                        workflow_id = %self.info.workflow_execution.workflow_id,
                        run_id = %self.info.workflow_execution.run_id,
                        "History ends inside a decision batch"
                    );
                    break;
                }
                NextBatch::Exhausted => break,
            }
        }

        if self.root.is_none() && !self.completion_emitted {
            return Err(CoreError::MalformedHistory(
                "history never started the workflow".to_string(),
            )
            .into());
        }

        let mut decisions = self.context.collect_pending_decisions();
        if let Some(terminal) = self.take_terminal_decision() {
            decisions.push(terminal);
        }
        timer.finish(self.metrics.as_ref());

        debug!(
            workflow_id = %self.info.workflow_execution.workflow_id,
            run_id = %self.info.workflow_execution.run_id,
            decisions = decisions.len(),
            completed = self.completion_emitted,
            "Decision task processed"
        );

        Ok(DecisionTaskCompletion {
            decisions,
            workflow_completed: self.completion_emitted,
        })
    }

    /// Whether the decisions this engine last sent were lost: a later task
    /// failed or timed out, or the orchestrator names a different previous
    /// task.
    fn is_stale_for(&self, task: &DecisionTask) -> bool {
        let last_live = self.last_live_started_event_id;
        if last_live == 0 {
            return false;
        }
        if task.previous_started_event_id > 0 && task.previous_started_event_id != last_live {
            return true;
        }
        task.history.iter().any(|event| {
            event.event_id > last_live
                && matches!(
                    event.event_type(),
                    EventType::DecisionTaskFailed | EventType::DecisionTaskTimedOut
                )
        })
    }

    /// Drop all run state so the next task replays from the first event.
    fn reset(&mut self) {
        self.root = None;
        self.scheduler = DeterministicScheduler::new();
        self.context = WorkflowContext::new(
            Arc::clone(&self.info),
            self.scheduler.handle(),
            Arc::clone(&self.codec),
        );
        self.completion_emitted = false;
        self.last_processed_event_id = 0;
        self.last_live_started_event_id = 0;
    }

    fn apply_batch(&mut self, batch: &DecisionEvents) -> Result<()> {
        let accepted = batch.replay && batch.is_completed();
        if !batch.replay {
            self.last_live_started_event_id = batch.task_started_event_id;
        }
        debug!(
            workflow_id = %self.info.workflow_execution.workflow_id,
            task_started_event_id = batch.task_started_event_id,
            events = batch.events.len(),
            decision_events = batch.decision_events.len(),
            replay = batch.replay,
            "Applying decision batch"
        );

        // Decisions of failed or timed-out tasks never reached history, so
        // code running for them behaves as live.
        self.context
            .set_replay_state(accepted, batch.replay_current_time.timestamp_millis());
        self.context.load_markers(&batch.markers);

        for event in &batch.events {
            self.apply_event(event)?;
        }
        self.run_scheduler()?;

        if accepted {
            self.context.notify_decision_sent();
        }
        for event in &batch.decision_events {
            self.apply_event(event)?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: &HistoryEvent) -> Result<()> {
        if event.event_id <= self.last_processed_event_id {
            return Ok(());
        }
        self.last_processed_event_id = event.event_id;

        match &event.attributes {
            EventAttributes::WorkflowExecutionStarted(attrs) => {
                self.start_root(attrs.input.clone());
                Ok(())
            }
            _ => {
                self.context.apply_event(event).map_err(|e| {
                    warn!(
                        workflow_id = %self.info.workflow_execution.workflow_id,
                        run_id = %self.info.workflow_execution.run_id,
                        event_id = event.event_id,
                        error = %e,
                        "History does not match workflow state"
                    );
                    CadenceError::from(e)
                })
            }
        }
    }

    fn start_root(&mut self, input: Option<Payload>) {
        if self.root.is_some() {
            warn!(
                workflow_id = %self.info.workflow_execution.workflow_id,
                "Workflow started twice in history; ignoring"
            );
            return;
        }
        let run = (self.workflow_fn)(self.context.clone(), input);
        self.root = Some(self.scheduler.handle().spawn(run));
    }

    fn run_scheduler(&mut self) -> Result<()> {
        let report = self.scheduler.run_once();

        if let Some(err) = self.context.take_nondeterminism() {
            return Err(err.into());
        }
        if let Some(failure) = report.failures.first() {
            self.metrics.increment_counter(names::WORKFLOW_PANICKED, 1);
            return Err(CadenceError::Panicked(format!(
                "{}: {}",
                failure.task_id, failure.message
            )));
        }
        Ok(())
    }

    fn take_terminal_decision(&mut self) -> Option<Decision> {
        if self.completion_emitted {
            return None;
        }
        let result = self.root.as_ref()?.try_take()?;
        self.completion_emitted = true;

        let decision = match result.and_then(|value| encode_value(self.codec.as_ref(), &value)) {
            Ok(payload) => {
                self.metrics.increment_counter(names::WORKFLOW_COMPLETED, 1);
                info!(
                    workflow_id = %self.info.workflow_execution.workflow_id,
                    run_id = %self.info.workflow_execution.run_id,
                    "Workflow completed"
                );
                Decision::CompleteWorkflowExecution {
                    result: Some(payload),
                }
            }
            Err(error) => {
                self.metrics.increment_counter(names::WORKFLOW_FAILED, 1);
                info!(
                    workflow_id = %self.info.workflow_execution.workflow_id,
                    run_id = %self.info.workflow_execution.run_id,
                    error = %error,
                    "Workflow failed"
                );
                self.failure_decision(error)
            }
        };
        Some(decision)
    }

    fn failure_decision(&self, error: CadenceError) -> Decision {
        let reason = classify_error(&error);
        let details = match error {
            CadenceError::WorkflowFailed {
                details: Some(details),
                ..
            } => Some(details),
            other => encode_value(self.codec.as_ref(), &other.to_string()).ok(),
        };
        Decision::FailWorkflowExecution { reason, details }
    }
}

/// Map a workflow error to the reason recorded with the failed run.
pub fn classify_error(error: &CadenceError) -> String {
    let reason = match error {
        CadenceError::WorkflowFailed { reason, .. } => return reason.clone(),
        CadenceError::ActivityFailed { .. } => "ACTIVITY_FAILED",
        CadenceError::ChildWorkflowFailed { .. } => "CHILD_WORKFLOW_FAILED",
        CadenceError::ExternalWorkflowFailed { .. } => "EXTERNAL_WORKFLOW_FAILED",
        CadenceError::Canceled(_) => "CANCELED",
        CadenceError::NonRetryable(_) => "NON_RETRYABLE",
        CadenceError::InvalidInput(_) => "NON_RETRYABLE",
        CadenceError::InvalidConfiguration(_) => "NON_RETRYABLE",
        CadenceError::WorkflowNotFound(_) => "NON_RETRYABLE",
        CadenceError::Serialization(_) => "SERIALIZATION",
        CadenceError::Codec(_) => "SERIALIZATION",
        CadenceError::Replay(_) => "NONDETERMINISTIC",
        _ => "GENERIC",
    };
    reason.to_string()
}

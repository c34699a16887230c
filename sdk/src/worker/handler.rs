//! DecisionTaskHandler - Turns one polled decision task into one response
//!
//! The handler is the boundary between the synchronous replay engine and the
//! asynchronous outside world. It pages in the rest of the task's history,
//! finds or builds the run's engine, lets it process the task, and reports
//! the result through exactly one call on the [`DecisionSink`].

use crate::common::codec::{JsonCodec, PayloadCodec};
use crate::config::DecisionWorkerConfig;
use crate::error::{CadenceError, Result};
use crate::telemetry::{names, noop_metrics, MetricsSink, RecordingTimer};
use crate::worker::cache::{SharedEngine, WorkflowCache};
use crate::worker::registry::WorkflowRegistry;
use crate::workflow::definition::WorkflowInfo;
use crate::workflow::engine::{DecisionTaskCompletion, WorkflowEngine};
use crate::workflow::scheduler::panic_message;
use async_trait::async_trait;
use cadence_core::{
    Decision, DecisionTask, EventType, HistoryEvent, HistoryPage, Payload, WorkflowExecution,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of history pages beyond the ones delivered with a task.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch the page that `next_page_token` points at.
    async fn get_more_history(
        &self,
        execution: &WorkflowExecution,
        next_page_token: &[u8],
        page_size: i32,
    ) -> Result<HistoryPage>;
}

/// Why a decision task was failed instead of completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionTaskFailedCause {
    /// History contradicts the decisions the workflow code makes.
    NondeterministicHistory,
    /// Anything else that went wrong while processing the task.
    WorkflowWorkerUnhandledFailure,
    /// Partial history arrived for a run this worker no longer caches.
    ResetStickyTaskList,
}

impl DecisionTaskFailedCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionTaskFailedCause::NondeterministicHistory => "NONDETERMINISTIC_HISTORY",
            DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure => {
                "WORKFLOW_WORKER_UNHANDLED_FAILURE"
            }
            DecisionTaskFailedCause::ResetStickyTaskList => "RESET_STICKY_TASKLIST",
        }
    }
}

impl fmt::Display for DecisionTaskFailedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response for a task whose decisions were produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedDecisionTask {
    pub task_token: Vec<u8>,
    pub decisions: Vec<Decision>,
    pub identity: String,
}

/// Response for a task that could not be processed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedDecisionTask {
    pub task_token: Vec<u8>,
    pub cause: DecisionTaskFailedCause,
    pub details: Option<Payload>,
    pub identity: String,
}

/// Receiver of decision task responses.
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn respond_completed(&self, response: CompletedDecisionTask) -> Result<()>;

    async fn respond_failed(&self, response: FailedDecisionTask) -> Result<()>;
}

/// What the handler reported for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandledDecisionTask {
    Completed {
        decisions: usize,
        workflow_completed: bool,
    },
    Failed {
        cause: DecisionTaskFailedCause,
    },
}

type Failure = (DecisionTaskFailedCause, CadenceError);

/// Processes decision tasks for the workflow types in a registry.
pub struct DecisionTaskHandler {
    config: DecisionWorkerConfig,
    registry: Arc<WorkflowRegistry>,
    cache: WorkflowCache,
    history: Arc<dyn HistorySource>,
    sink: Arc<dyn DecisionSink>,
    codec: Arc<dyn PayloadCodec>,
    metrics: Arc<dyn MetricsSink>,
}

impl fmt::Debug for DecisionTaskHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionTaskHandler")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl DecisionTaskHandler {
    pub fn new(
        config: DecisionWorkerConfig,
        registry: Arc<WorkflowRegistry>,
        history: Arc<dyn HistorySource>,
        sink: Arc<dyn DecisionSink>,
    ) -> Self {
        let cache = WorkflowCache::new(config.max_cached_workflows);
        Self {
            config,
            registry,
            cache,
            history,
            sink,
            codec: Arc::new(JsonCodec),
            metrics: noop_metrics(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &DecisionWorkerConfig {
        &self.config
    }

    pub fn cache(&self) -> &WorkflowCache {
        &self.cache
    }

    /// Process a task and send its response.
    ///
    /// Errors are returned only when the response itself could not be
    /// delivered; processing failures are reported to the sink.
    pub async fn handle(&self, task: DecisionTask) -> Result<HandledDecisionTask> {
        let timer = RecordingTimer::start(names::DECISION_TASK_LATENCY);
        let execution = task.workflow_execution.clone();
        let task_token = task.task_token.clone();
        debug!(
            workflow_id = %execution.workflow_id,
            run_id = %execution.run_id,
            started_event_id = task.started_event_id,
            attempt = task.attempt,
            "Handling decision task"
        );

        let outcome = match self.fetch_history(task).await {
            Ok(task) => self.process(&task),
            Err(e) => {
                self.cache.evict(&execution);
                Err((DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure, e))
            }
        };

        let handled = match outcome {
            Ok(completion) => {
                let handled = HandledDecisionTask::Completed {
                    decisions: completion.decisions.len(),
                    workflow_completed: completion.workflow_completed,
                };
                self.metrics.increment_counter(names::DECISION_TASK_COMPLETED, 1);
                self.metrics
                    .increment_counter(names::DECISIONS_SENT, completion.decisions.len() as u64);
                info!(
                    workflow_id = %execution.workflow_id,
                    run_id = %execution.run_id,
                    decisions = completion.decisions.len(),
                    workflow_completed = completion.workflow_completed,
                    "Decision task completed"
                );
                let delivered = self
                    .sink
                    .respond_completed(CompletedDecisionTask {
                        task_token,
                        decisions: completion.decisions,
                        identity: self.config.identity.clone(),
                    })
                    .await;
                if let Err(e) = delivered {
                    // the cached engine already counts these decisions as sent
                    self.cache.evict(&execution);
                    warn!(
                        workflow_id = %execution.workflow_id,
                        run_id = %execution.run_id,
                        error = %e,
                        "Decision task response not delivered; evicted workflow"
                    );
                    return Err(e);
                }
                handled
            }
            Err((cause, e)) => {
                self.metrics.increment_counter(names::DECISION_TASK_FAILED, 1);
                error!(
                    workflow_id = %execution.workflow_id,
                    run_id = %execution.run_id,
                    cause = %cause,
                    error = %e,
                    "Decision task failed"
                );
                self.sink
                    .respond_failed(FailedDecisionTask {
                        task_token,
                        cause,
                        details: Some(e.to_string().into_bytes()),
                        identity: self.config.identity.clone(),
                    })
                    .await?;
                HandledDecisionTask::Failed { cause }
            }
        };

        timer.finish(self.metrics.as_ref());
        Ok(handled)
    }

    async fn fetch_history(&self, mut task: DecisionTask) -> Result<DecisionTask> {
        let mut pages = 0;
        while let Some(token) = task.next_page_token.take() {
            if pages >= self.config.max_history_pages {
                return Err(CadenceError::HistoryUnavailable(format!(
                    "history of {} exceeds {} pages",
                    task.workflow_execution, self.config.max_history_pages
                )));
            }
            let request = self.history.get_more_history(
                &task.workflow_execution,
                &token,
                self.config.history_page_size,
            );
            let page = tokio::time::timeout(self.config.history_fetch_timeout, request)
                .await
                .map_err(|_| {
                    CadenceError::HistoryUnavailable(format!(
                        "history page request for {} timed out after {:?}",
                        task.workflow_execution, self.config.history_fetch_timeout
                    ))
                })??;
            pages += 1;
            self.metrics.increment_counter(names::HISTORY_PAGES_FETCHED, 1);
            debug!(
                execution = %task.workflow_execution,
                events = page.events.len(),
                last_page = page.is_last(),
                "Fetched history page"
            );
            task.history.extend(page.events);
            task.next_page_token = page.next_page_token;
        }
        Ok(task)
    }

    fn process(&self, task: &DecisionTask) -> std::result::Result<DecisionTaskCompletion, Failure> {
        let execution = &task.workflow_execution;
        let engine = match self.cache.get(execution) {
            Some(engine) => {
                self.metrics.increment_counter(names::CACHE_HIT, 1);
                engine
            }
            None => {
                self.metrics.increment_counter(names::CACHE_MISS, 1);
                self.new_engine(task)?
            }
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            engine.lock().process_decision_task(task)
        }))
        .unwrap_or_else(|panic| Err(CadenceError::Panicked(panic_message(panic.as_ref()))));

        match result {
            Ok(completion) => {
                if completion.workflow_completed {
                    self.cache.evict(execution);
                } else if let Some(evicted) = self.cache.insert(execution.clone(), engine) {
                    self.metrics.increment_counter(names::CACHE_EVICTION, 1);
                    debug!(evicted = %evicted, "Workflow cache full");
                }
                Ok(completion)
            }
            Err(e) => {
                self.cache.evict(execution);
                let cause = match e {
                    CadenceError::Replay(_) => DecisionTaskFailedCause::NondeterministicHistory,
                    CadenceError::StaleState(_) => DecisionTaskFailedCause::ResetStickyTaskList,
                    _ => DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure,
                };
                Err((cause, e))
            }
        }
    }

    fn new_engine(&self, task: &DecisionTask) -> std::result::Result<SharedEngine, Failure> {
        let starts_run = task
            .history
            .first()
            .map(|event: &HistoryEvent| event.event_type() == EventType::WorkflowExecutionStarted)
            .unwrap_or(false);
        if !starts_run {
            warn!(
                execution = %task.workflow_execution,
                "Partial history for a run that is not cached"
            );
            return Err((
                DecisionTaskFailedCause::ResetStickyTaskList,
                CadenceError::HistoryUnavailable(format!(
                    "no cached state for {} and history is partial",
                    task.workflow_execution
                )),
            ));
        }

        let workflow_fn = self.registry.get(&task.workflow_type).ok_or_else(|| {
            (
                DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure,
                CadenceError::WorkflowNotFound(task.workflow_type.clone()),
            )
        })?;

        let info = WorkflowInfo {
            workflow_execution: task.workflow_execution.clone(),
            workflow_type: task.workflow_type.clone(),
            domain: self.config.domain.clone(),
            task_list: self.config.task_list.clone(),
        };
        Ok(Arc::new(Mutex::new(WorkflowEngine::new(
            info,
            workflow_fn,
            Arc::clone(&self.codec),
            Arc::clone(&self.metrics),
        ))))
    }
}

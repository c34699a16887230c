//! Workflow context
//!
//! The context is handed explicitly to every workflow function. It is the only
//! way workflow code talks to the outside world: every operation either
//! creates a decision state machine and returns a future that the engine
//! resolves from history, or reads state the engine derived from history
//! (replay flag, clock, signals, side effect results).

use crate::common::codec::{decode_value, encode_value, PayloadCodec};
use crate::error::{CadenceError, Result};
use crate::workflow::definition::WorkflowInfo;
use crate::workflow::future::{ActivityFuture, ChildWorkflowFuture, ExternalFuture, TimerFuture};
use crate::workflow::random::SeededRandom;
use crate::workflow::scheduler::{JoinHandle, Placeholder, PlaceholderId, SchedulerHandle};
use cadence_core::decision::{
    RecordMarkerDecisionAttributes, RequestCancelExternalWorkflowExecutionDecisionAttributes,
    ScheduleActivityTaskDecisionAttributes, SignalExternalWorkflowExecutionDecisionAttributes,
    StartChildWorkflowExecutionDecisionAttributes, StartTimerDecisionAttributes,
};
use cadence_core::{
    CoreError, Decision, DecisionId, DecisionManager, DecisionTarget, EventAttributes,
    HistoryEvent, Outcome, Payload, WorkflowExecution,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Marker name under which side effect results are recorded.
pub const SIDE_EFFECT_MARKER_NAME: &str = "SideEffect";

/// Options for scheduling an activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityOptions {
    /// Explicit activity id; generated when absent
    pub activity_id: Option<String>,
    /// Task list override; defaults to the workflow's task list
    pub task_list: Option<String>,
    pub schedule_to_close_timeout: Duration,
    pub schedule_to_start_timeout: Duration,
    pub start_to_close_timeout: Duration,
    pub heartbeat_timeout: Duration,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            activity_id: None,
            task_list: None,
            schedule_to_close_timeout: Duration::from_secs(300),
            schedule_to_start_timeout: Duration::from_secs(60),
            start_to_close_timeout: Duration::from_secs(240),
            heartbeat_timeout: Duration::ZERO,
        }
    }
}

impl ActivityOptions {
    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }

    pub fn with_schedule_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_close_timeout = timeout;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }
}

/// Options for starting a child workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildWorkflowOptions {
    /// Explicit workflow id; generated from the parent run id when absent
    pub workflow_id: Option<String>,
    pub domain: Option<String>,
    pub task_list: Option<String>,
    pub execution_start_to_close_timeout: Duration,
    pub task_start_to_close_timeout: Duration,
}

impl Default for ChildWorkflowOptions {
    fn default() -> Self {
        Self {
            workflow_id: None,
            domain: None,
            task_list: None,
            execution_start_to_close_timeout: Duration::from_secs(3600),
            task_start_to_close_timeout: Duration::from_secs(10),
        }
    }
}

impl ChildWorkflowOptions {
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_start_to_close_timeout = timeout;
        self
    }
}

fn timeout_seconds(duration: Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}

fn timer_seconds(duration: Duration) -> i64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// Per-run state shared by every clone of a context.
struct ContextState {
    decisions: DecisionManager,
    waiting: HashMap<DecisionId, PlaceholderId>,
    replaying: bool,
    current_time_millis: i64,
    next_id: u64,
    next_side_effect: u64,
    side_effects: HashMap<String, Option<Payload>>,
    signals: HashMap<String, VecDeque<Option<Payload>>>,
    signal_waiters: HashMap<String, VecDeque<PlaceholderId>>,
    cancel_requested: bool,
    random: SeededRandom,
    nondeterminism: Option<CoreError>,
}

impl ContextState {
    fn next_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }
}

enum SignalSlot {
    Buffered(Option<Payload>),
    Waiting(Placeholder<Outcome>),
}

/// Deterministic API available to workflow code.
///
/// Cheap to clone; clones share the same run.
#[derive(Clone)]
pub struct WorkflowContext {
    state: Arc<Mutex<ContextState>>,
    scheduler: SchedulerHandle<Outcome>,
    codec: Arc<dyn PayloadCodec>,
    info: Arc<WorkflowInfo>,
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl WorkflowContext {
    pub(crate) fn new(
        info: Arc<WorkflowInfo>,
        scheduler: SchedulerHandle<Outcome>,
        codec: Arc<dyn PayloadCodec>,
    ) -> Self {
        let random = SeededRandom::from_run_id(&info.workflow_execution.run_id);
        Self {
            state: Arc::new(Mutex::new(ContextState {
                decisions: DecisionManager::new(),
                waiting: HashMap::new(),
                replaying: false,
                current_time_millis: 0,
                next_id: 0,
                next_side_effect: 0,
                side_effects: HashMap::new(),
                signals: HashMap::new(),
                signal_waiters: HashMap::new(),
                cancel_requested: false,
                random,
                nondeterminism: None,
            })),
            scheduler,
            codec,
            info,
        }
    }

    // ==== Run information ====

    pub fn workflow_info(&self) -> &WorkflowInfo {
        &self.info
    }

    pub fn codec(&self) -> &dyn PayloadCodec {
        self.codec.as_ref()
    }

    /// True while the code is re-executing decisions the orchestrator
    /// already accepted.
    pub fn is_replaying(&self) -> bool {
        self.state.lock().replaying
    }

    /// Workflow clock: the start time of the decision task being applied.
    pub fn current_time_millis(&self) -> i64 {
        self.state.lock().current_time_millis
    }

    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.current_time_millis()).unwrap_or_default()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.state.lock().cancel_requested
    }

    // ==== Activities ====

    /// Schedule an activity and return a future for its result.
    pub fn schedule_activity<I, O>(
        &self,
        activity_type: &str,
        input: &I,
        options: ActivityOptions,
    ) -> Result<ActivityFuture<O>>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = encode_value(self.codec(), input)?;
        let placeholder = self.scheduler.placeholder();

        let id = {
            let mut state = self.state.lock();
            let activity_id = match options.activity_id {
                Some(id) => id,
                None => state.next_id(),
            };
            if state.decisions.is_live(&DecisionId::activity(activity_id.as_str())) {
                return Err(CadenceError::InvalidInput(format!(
                    "activity id {} is already in use",
                    activity_id
                )));
            }
            let id = state
                .decisions
                .schedule_activity(ScheduleActivityTaskDecisionAttributes {
                    activity_id,
                    activity_type: activity_type.to_string(),
                    domain: None,
                    task_list: options
                        .task_list
                        .unwrap_or_else(|| self.info.task_list.clone()),
                    input: Some(input),
                    schedule_to_close_timeout_seconds: timeout_seconds(
                        options.schedule_to_close_timeout,
                    ),
                    schedule_to_start_timeout_seconds: timeout_seconds(
                        options.schedule_to_start_timeout,
                    ),
                    start_to_close_timeout_seconds: timeout_seconds(options.start_to_close_timeout),
                    heartbeat_timeout_seconds: timeout_seconds(options.heartbeat_timeout),
                });
            state.waiting.insert(id.clone(), placeholder.id());
            id
        };
        debug!(decision_id = %id, activity_type, "Scheduled activity");

        Ok(ActivityFuture::new(id, placeholder, self.clone()))
    }

    /// Schedule an activity and wait for its result.
    pub async fn execute_activity<I, O>(
        &self,
        activity_type: &str,
        input: &I,
        options: ActivityOptions,
    ) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.schedule_activity(activity_type, input, options)?.await
    }

    // ==== Timers ====

    /// Start a timer. Sub-second remainders round up to a whole second; a
    /// zero duration fires immediately without a decision.
    pub fn start_timer(&self, duration: Duration) -> TimerFuture {
        let placeholder = self.scheduler.placeholder();
        if duration.is_zero() {
            self.scheduler
                .resolve(placeholder.id(), Outcome::Completed(None));
            return TimerFuture::new(None, placeholder, self.clone());
        }

        let id = {
            let mut state = self.state.lock();
            let timer_id = state.next_id();
            let id = state.decisions.start_timer(StartTimerDecisionAttributes {
                timer_id,
                start_to_fire_timeout_seconds: timer_seconds(duration),
            });
            state.waiting.insert(id.clone(), placeholder.id());
            id
        };
        debug!(decision_id = %id, ?duration, "Started timer");

        TimerFuture::new(Some(id), placeholder, self.clone())
    }

    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.start_timer(duration).await
    }

    // ==== Child workflows ====

    pub fn start_child_workflow<I, O>(
        &self,
        workflow_type: &str,
        input: &I,
        options: ChildWorkflowOptions,
    ) -> Result<ChildWorkflowFuture<O>>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = encode_value(self.codec(), input)?;
        let placeholder = self.scheduler.placeholder();

        let id = {
            let mut state = self.state.lock();
            let workflow_id = match options.workflow_id {
                Some(id) => id,
                None => format!("{}_{}", self.info.workflow_execution.run_id, state.next_id()),
            };
            if state.decisions.is_live(&DecisionId::child_workflow(workflow_id.as_str())) {
                return Err(CadenceError::InvalidInput(format!(
                    "child workflow id {} is already in use",
                    workflow_id
                )));
            }
            let id = state.decisions.start_child_workflow(
                StartChildWorkflowExecutionDecisionAttributes {
                    domain: options.domain.unwrap_or_else(|| self.info.domain.clone()),
                    workflow_id,
                    workflow_type: workflow_type.to_string(),
                    task_list: options
                        .task_list
                        .unwrap_or_else(|| self.info.task_list.clone()),
                    input: Some(input),
                    execution_start_to_close_timeout_seconds: timeout_seconds(
                        options.execution_start_to_close_timeout,
                    ),
                    task_start_to_close_timeout_seconds: timeout_seconds(
                        options.task_start_to_close_timeout,
                    ),
                },
            );
            state.waiting.insert(id.clone(), placeholder.id());
            id
        };
        debug!(decision_id = %id, workflow_type, "Started child workflow");

        Ok(ChildWorkflowFuture::new(id, placeholder, self.clone()))
    }

    pub async fn execute_child_workflow<I, O>(
        &self,
        workflow_type: &str,
        input: &I,
        options: ChildWorkflowOptions,
    ) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.start_child_workflow(workflow_type, input, options)?
            .await
    }

    // ==== External workflows ====

    /// Signal another workflow run. Resolves once the orchestrator delivered
    /// or rejected the signal.
    pub fn signal_external_workflow<I>(
        &self,
        execution: WorkflowExecution,
        signal_name: &str,
        input: &I,
        child_workflow_only: bool,
    ) -> Result<ExternalFuture>
    where
        I: Serialize + ?Sized,
    {
        let input = encode_value(self.codec(), input)?;
        let placeholder = self.scheduler.placeholder();
        let workflow_id = execution.workflow_id.clone();

        let id = {
            let mut state = self.state.lock();
            let control = state.next_id();
            let id = state.decisions.signal_external_workflow(
                SignalExternalWorkflowExecutionDecisionAttributes {
                    domain: self.info.domain.clone(),
                    execution,
                    signal_name: signal_name.to_string(),
                    input: Some(input),
                    control,
                    child_workflow_only,
                },
            );
            state.waiting.insert(id.clone(), placeholder.id());
            id
        };
        debug!(decision_id = %id, signal_name, "Signaling external workflow");

        Ok(ExternalFuture::new(id, workflow_id, placeholder, self.clone()))
    }

    /// Ask the orchestrator to cancel another workflow run.
    pub fn request_cancel_external_workflow(
        &self,
        execution: WorkflowExecution,
        child_workflow_only: bool,
    ) -> ExternalFuture {
        let placeholder = self.scheduler.placeholder();
        let workflow_id = execution.workflow_id.clone();

        let id = {
            let mut state = self.state.lock();
            let control = state.next_id();
            let id = state.decisions.request_cancel_external_workflow(
                RequestCancelExternalWorkflowExecutionDecisionAttributes {
                    domain: self.info.domain.clone(),
                    workflow_id: execution.workflow_id,
                    run_id: execution.run_id,
                    control,
                    child_workflow_only,
                },
            );
            state.waiting.insert(id.clone(), placeholder.id());
            id
        };
        debug!(decision_id = %id, "Requesting external workflow cancellation");

        ExternalFuture::new(id, workflow_id, placeholder, self.clone())
    }

    // ==== Side effects and search attributes ====

    /// Run `f` once and record its result in history.
    ///
    /// On replay the recorded result is returned and `f` is not called.
    pub fn side_effect<T, F>(&self, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let (marker_id, cached, replaying) = {
            let mut state = self.state.lock();
            let marker_id = state.next_side_effect.to_string();
            state.next_side_effect += 1;
            let cached = state.side_effects.get(&marker_id).cloned();
            (marker_id, cached, state.replaying)
        };

        let details = match cached {
            Some(details) => details,
            None if replaying => {
                let message = format!("no recorded result for side effect {}", marker_id);
                warn!(
                    workflow_id = %self.info.workflow_execution.workflow_id,
                    marker_id = %marker_id,
                    "Side effect missing from history during replay"
                );
                self.state
                    .lock()
                    .nondeterminism
                    .get_or_insert_with(|| CoreError::MalformedHistory(message.clone()));
                return Err(CoreError::MalformedHistory(message).into());
            }
            None => Some(encode_value(self.codec(), &f())?),
        };

        self.state
            .lock()
            .decisions
            .record_marker(RecordMarkerDecisionAttributes {
                marker_name: SIDE_EFFECT_MARKER_NAME.to_string(),
                marker_id,
                details: details.clone(),
            });

        decode_value(self.codec(), details.as_deref())
    }

    /// Merge search attributes into the run's indexed attributes.
    pub fn upsert_search_attributes(&self, attributes: BTreeMap<String, Value>) -> Result<()> {
        if attributes.is_empty() {
            return Err(CadenceError::InvalidInput(
                "search attributes must not be empty".to_string(),
            ));
        }
        let mut encoded = BTreeMap::new();
        for (key, value) in attributes {
            encoded.insert(key, encode_value(self.codec(), &value)?);
        }

        let mut state = self.state.lock();
        let id = state.next_id();
        state.decisions.upsert_search_attributes(id, encoded);
        Ok(())
    }

    // ==== Signals ====

    /// Wait for the next signal with the given name.
    ///
    /// Signals are delivered in history order; a signal that arrived before
    /// anyone waited for it is buffered.
    pub async fn receive_signal<T: DeserializeOwned>(&self, signal_name: &str) -> Result<T> {
        let payload = match self.take_signal(signal_name) {
            SignalSlot::Buffered(payload) => payload,
            SignalSlot::Waiting(placeholder) => match placeholder.await {
                Outcome::Completed(payload) => payload,
                _ => {
                    return Err(CadenceError::Canceled(format!(
                        "signal {} no longer awaited",
                        signal_name
                    )))
                }
            },
        };
        decode_value(self.codec(), payload.as_deref())
    }

    fn take_signal(&self, signal_name: &str) -> SignalSlot {
        let mut state = self.state.lock();
        if let Some(payload) = state
            .signals
            .get_mut(signal_name)
            .and_then(|queue| queue.pop_front())
        {
            return SignalSlot::Buffered(payload);
        }
        let placeholder = self.scheduler.placeholder();
        state
            .signal_waiters
            .entry(signal_name.to_string())
            .or_default()
            .push_back(placeholder.id());
        SignalSlot::Waiting(placeholder)
    }

    // ==== Tasks and randomness ====

    /// Run a future concurrently with the rest of the workflow code.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.scheduler.spawn(future)
    }

    /// A UUID that is the same on every replay of this run.
    pub fn random_uuid(&self) -> Uuid {
        self.state.lock().random.next_uuid()
    }

    pub fn random_u64(&self) -> u64 {
        self.state.lock().random.next_u64()
    }

    // ==== Engine side ====

    /// Route a cancellation request to the machine owning `id`.
    ///
    /// A cancelled timer resolves its future right away; everything else
    /// resolves once history confirms the cancellation.
    pub(crate) fn request_cancel(&self, id: &DecisionId) -> bool {
        let resolved = {
            let mut state = self.state.lock();
            if !state.decisions.request_cancel(id) {
                return false;
            }
            if id.target == DecisionTarget::Timer {
                state.waiting.remove(id)
            } else {
                None
            }
        };
        debug!(decision_id = %id, "Cancellation requested");
        if let Some(placeholder) = resolved {
            self.scheduler.resolve(placeholder, Outcome::Canceled(None));
        }
        true
    }

    pub(crate) fn set_replay_state(&self, replaying: bool, current_time_millis: i64) {
        let mut state = self.state.lock();
        state.replaying = replaying;
        state.current_time_millis = current_time_millis;
    }

    /// Cache side effect results recorded in history.
    pub(crate) fn load_markers(&self, markers: &[HistoryEvent]) {
        let mut state = self.state.lock();
        for event in markers {
            if let EventAttributes::MarkerRecorded(attrs) = &event.attributes {
                if attrs.marker_name == SIDE_EFFECT_MARKER_NAME {
                    state
                        .side_effects
                        .insert(attrs.marker_id.clone(), attrs.details.clone());
                }
            }
        }
    }

    /// Apply one history event and wake whatever was waiting on it.
    pub(crate) fn apply_event(&self, event: &HistoryEvent) -> std::result::Result<(), CoreError> {
        match &event.attributes {
            EventAttributes::WorkflowExecutionSignaled(attrs) => {
                self.deliver_signal(&attrs.signal_name, attrs.input.clone());
                Ok(())
            }
            EventAttributes::WorkflowExecutionCancelRequested(_) => {
                self.state.lock().cancel_requested = true;
                Ok(())
            }
            _ => {
                let resolved = {
                    let mut state = self.state.lock();
                    let Some(resolution) = state.decisions.handle_event(event)? else {
                        return Ok(());
                    };
                    state
                        .waiting
                        .remove(&resolution.id)
                        .map(|placeholder| (placeholder, resolution.outcome))
                };
                if let Some((placeholder, outcome)) = resolved {
                    self.scheduler.resolve(placeholder, outcome);
                }
                Ok(())
            }
        }
    }

    fn deliver_signal(&self, signal_name: &str, input: Option<Payload>) {
        loop {
            let waiter = {
                let mut state = self.state.lock();
                match state
                    .signal_waiters
                    .get_mut(signal_name)
                    .and_then(|waiters| waiters.pop_front())
                {
                    Some(waiter) => waiter,
                    None => {
                        state
                            .signals
                            .entry(signal_name.to_string())
                            .or_default()
                            .push_back(input);
                        return;
                    }
                }
            };
            if self
                .scheduler
                .resolve(waiter, Outcome::Completed(input.clone()))
            {
                return;
            }
        }
    }

    pub(crate) fn collect_pending_decisions(&self) -> Vec<Decision> {
        self.state.lock().decisions.collect_pending_decisions()
    }

    pub(crate) fn notify_decision_sent(&self) {
        self.state.lock().decisions.notify_decision_sent();
    }

    pub(crate) fn take_nondeterminism(&self) -> Option<CoreError> {
        self.state.lock().nondeterminism.take()
    }
}

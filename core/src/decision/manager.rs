//! Decision manager
//!
//! Owns every state machine of a run, routes history events to them and
//! gathers their pending decisions in causal order.
//!
//! Routing is a single `match` over [`EventAttributes`]: each variant maps to
//! either the caller-chosen [`DecisionId`] it carries (initiating events) or a
//! `(target, initiated event id)` alias learned when the machine was
//! initiated. A miss in either table means the history and the workflow code
//! disagree, and is reported as an error.

use super::state_machine::*;
use super::types::*;
use crate::error::{CoreError, CoreResult};
use crate::history::{EventAttributes, HistoryEvent, Payload};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

/// Which handler of the located machine an event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Initiated,
    Started,
    Completion,
    Canceled,
    CancelInitiated,
    CancelFailed,
    /// Delivery or failure of a cancel-external request, which belongs to a
    /// child workflow machine when the request was child-only.
    ExternalCancelResolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RouteKey {
    Caller(DecisionId),
    Alias(DecisionTarget, i64),
    NextUpsert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    key: RouteKey,
    handler: Handler,
}

impl Route {
    fn caller(target: DecisionTarget, id: &str, handler: Handler) -> Self {
        Self {
            key: RouteKey::Caller(DecisionId::new(target, id)),
            handler,
        }
    }

    fn alias(target: DecisionTarget, event_id: i64, handler: Handler) -> Self {
        Self {
            key: RouteKey::Alias(target, event_id),
            handler,
        }
    }
}

/// Dispatch table. `None` for events that belong to no decision.
fn route(event: &HistoryEvent) -> Option<Route> {
    use DecisionTarget::*;
    use EventAttributes as A;
    use Handler::*;

    let route = match &event.attributes {
        A::ActivityTaskScheduled(a) => Route::caller(Activity, &a.activity_id, Initiated),
        A::ActivityTaskStarted(a) => Route::alias(Activity, a.scheduled_event_id, Started),
        A::ActivityTaskCompleted(a) => Route::alias(Activity, a.scheduled_event_id, Completion),
        A::ActivityTaskFailed(a) => Route::alias(Activity, a.scheduled_event_id, Completion),
        A::ActivityTaskTimedOut(a) => Route::alias(Activity, a.scheduled_event_id, Completion),
        A::ActivityTaskCanceled(a) => Route::alias(Activity, a.scheduled_event_id, Canceled),
        A::ActivityTaskCancelRequested(a) => {
            Route::caller(Activity, &a.activity_id, CancelInitiated)
        }
        A::RequestCancelActivityTaskFailed(a) => {
            Route::caller(Activity, &a.activity_id, CancelFailed)
        }

        A::TimerStarted(t) => Route::caller(Timer, &t.timer_id, Initiated),
        A::TimerFired(t) => Route::alias(Timer, t.started_event_id, Completion),
        A::TimerCanceled(t) => Route::alias(Timer, t.started_event_id, Canceled),
        A::CancelTimerFailed(t) => Route::caller(Timer, &t.timer_id, CancelFailed),

        A::StartChildWorkflowExecutionInitiated(c) => {
            Route::caller(ChildWorkflow, &c.workflow_id, Initiated)
        }
        A::StartChildWorkflowExecutionFailed(c) => {
            Route::alias(ChildWorkflow, c.initiated_event_id, Completion)
        }
        A::ChildWorkflowExecutionStarted(c) => {
            Route::alias(ChildWorkflow, c.initiated_event_id, Started)
        }
        A::ChildWorkflowExecutionCompleted(c) => {
            Route::alias(ChildWorkflow, c.initiated_event_id, Completion)
        }
        A::ChildWorkflowExecutionFailed(c) => {
            Route::alias(ChildWorkflow, c.initiated_event_id, Completion)
        }
        A::ChildWorkflowExecutionTimedOut(c) => {
            Route::alias(ChildWorkflow, c.initiated_event_id, Completion)
        }
        A::ChildWorkflowExecutionTerminated(c) => {
            Route::alias(ChildWorkflow, c.initiated_event_id, Completion)
        }
        A::ChildWorkflowExecutionCanceled(c) => {
            Route::alias(ChildWorkflow, c.initiated_event_id, Canceled)
        }

        A::RequestCancelExternalWorkflowExecutionInitiated(c) if c.child_workflow_only => {
            Route::caller(ChildWorkflow, &c.workflow_execution.workflow_id, CancelInitiated)
        }
        A::RequestCancelExternalWorkflowExecutionInitiated(c) => {
            Route::caller(CancelExternalWorkflow, &c.control, Initiated)
        }
        A::RequestCancelExternalWorkflowExecutionFailed(c) => Route::alias(
            CancelExternalWorkflow,
            c.initiated_event_id,
            ExternalCancelResolved,
        ),
        A::ExternalWorkflowExecutionCancelRequested(c) => Route::alias(
            CancelExternalWorkflow,
            c.initiated_event_id,
            ExternalCancelResolved,
        ),

        A::SignalExternalWorkflowExecutionInitiated(s) => {
            Route::caller(SignalExternalWorkflow, &s.control, Initiated)
        }
        A::SignalExternalWorkflowExecutionFailed(s) => {
            Route::alias(SignalExternalWorkflow, s.initiated_event_id, Completion)
        }
        A::ExternalWorkflowExecutionSignaled(s) => {
            Route::alias(SignalExternalWorkflow, s.initiated_event_id, Completion)
        }

        A::MarkerRecorded(m) => Route::caller(Marker, &m.marker_id, Initiated),
        A::UpsertWorkflowSearchAttributes(_) => Route {
            key: RouteKey::NextUpsert,
            handler: Initiated,
        },

        A::WorkflowExecutionStarted(_)
        | A::WorkflowExecutionCompleted(_)
        | A::WorkflowExecutionFailed(_)
        | A::WorkflowExecutionCancelRequested(_)
        | A::WorkflowExecutionSignaled(_)
        | A::DecisionTaskScheduled(_)
        | A::DecisionTaskStarted(_)
        | A::DecisionTaskCompleted(_)
        | A::DecisionTaskFailed(_)
        | A::DecisionTaskTimedOut(_) => return None,
    };
    Some(route)
}

/// Correlation table and decision aggregator for one workflow run.
#[derive(Debug, Default)]
pub struct DecisionManager {
    /// Every machine ever created. Replaced machines stay reachable through
    /// their aliases.
    machines: Vec<Box<dyn DecisionStateMachine>>,
    by_id: HashMap<DecisionId, usize>,
    aliases: HashMap<(DecisionTarget, i64), usize>,
    /// Collection order; recently cancelled machines move to the end.
    order: Vec<usize>,
    pending_upserts: VecDeque<usize>,
}

impl DecisionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ==== Creation ====

    pub fn schedule_activity(
        &mut self,
        attributes: ScheduleActivityTaskDecisionAttributes,
    ) -> DecisionId {
        self.add_machine(Box::new(ActivityStateMachine::new(attributes)))
    }

    pub fn start_timer(&mut self, attributes: StartTimerDecisionAttributes) -> DecisionId {
        self.add_machine(Box::new(TimerStateMachine::new(attributes)))
    }

    pub fn start_child_workflow(
        &mut self,
        attributes: StartChildWorkflowExecutionDecisionAttributes,
    ) -> DecisionId {
        self.add_machine(Box::new(ChildWorkflowStateMachine::new(attributes)))
    }

    pub fn record_marker(&mut self, attributes: RecordMarkerDecisionAttributes) -> DecisionId {
        self.add_machine(Box::new(MarkerStateMachine::new(attributes)))
    }

    pub fn upsert_search_attributes(
        &mut self,
        id: impl Into<String>,
        search_attributes: BTreeMap<String, Payload>,
    ) -> DecisionId {
        let id = self.add_machine(Box::new(UpsertSearchAttributesStateMachine::new(
            id,
            search_attributes,
        )));
        if let Some(&index) = self.by_id.get(&id) {
            if !self.pending_upserts.contains(&index) {
                self.pending_upserts.push_back(index);
            }
        }
        id
    }

    pub fn signal_external_workflow(
        &mut self,
        attributes: SignalExternalWorkflowExecutionDecisionAttributes,
    ) -> DecisionId {
        self.add_machine(Box::new(SignalExternalStateMachine::new(attributes)))
    }

    pub fn request_cancel_external_workflow(
        &mut self,
        attributes: RequestCancelExternalWorkflowExecutionDecisionAttributes,
    ) -> DecisionId {
        self.add_machine(Box::new(CancelExternalStateMachine::new(attributes)))
    }

    fn add_machine(&mut self, machine: Box<dyn DecisionStateMachine>) -> DecisionId {
        let id = machine.id().clone();
        if let Some(&existing) = self.by_id.get(&id) {
            if !self.machines[existing].is_terminal() {
                debug!(decision_id = %id, "Reusing live decision state machine");
                return id;
            }
            self.order.retain(|&i| i != existing);
        }

        let index = self.machines.len();
        self.machines.push(machine);
        self.by_id.insert(id.clone(), index);
        self.order.push(index);
        id
    }

    // ==== Cancellation ====

    /// Ask the machine named `id` to cancel. Returns false when no such
    /// machine exists, it is terminal, or its kind cannot be cancelled.
    pub fn request_cancel(&mut self, id: &DecisionId) -> bool {
        let Some(&index) = self.by_id.get(id) else {
            return false;
        };
        if !self.machines[index].request_cancel() {
            return false;
        }
        self.order.retain(|&i| i != index);
        self.order.push(index);
        true
    }

    // ==== Events ====

    /// Route one event to the machine it references.
    ///
    /// Returns the outcome when the event resolved a decision. Events that no
    /// decision owns (workflow and decision task events) are skipped.
    pub fn handle_event(&mut self, event: &HistoryEvent) -> CoreResult<Option<Resolution>> {
        let Some(route) = route(event) else {
            return Ok(None);
        };
        let index = self.locate(&route.key, event)?;

        let machine = &mut self.machines[index];
        let target = machine.id().target;
        let mut alias = None;
        let (accepted, outcome) = match route.handler {
            Handler::Initiated => {
                let accepted = machine.handle_initiated(event);
                if accepted {
                    alias = Some((target, event.event_id));
                }
                (accepted, None)
            }
            Handler::Started => (machine.handle_started(event), None),
            Handler::Completion => {
                let outcome = machine.handle_completion(event);
                (outcome.is_some(), outcome)
            }
            Handler::Canceled => {
                let outcome = machine.handle_canceled(event);
                (outcome.is_some(), outcome)
            }
            Handler::CancelInitiated => {
                let accepted = machine.handle_cancel_initiated(event);
                if accepted && target == DecisionTarget::ChildWorkflow {
                    alias = Some((DecisionTarget::CancelExternalWorkflow, event.event_id));
                }
                (accepted, None)
            }
            Handler::CancelFailed => (machine.handle_cancel_failed(event), None),
            Handler::ExternalCancelResolved if target == DecisionTarget::ChildWorkflow => {
                match &event.attributes {
                    EventAttributes::RequestCancelExternalWorkflowExecutionFailed(_) => {
                        (machine.handle_cancel_failed(event), None)
                    }
                    // the child's own canceled event resolves it
                    _ => (true, None),
                }
            }
            Handler::ExternalCancelResolved => {
                let outcome = machine.handle_completion(event);
                (outcome.is_some(), outcome)
            }
        };
        let id = machine.id().clone();

        if !accepted {
            debug!(
                decision_id = %id,
                event_id = event.event_id,
                event_type = ?event.event_type(),
                state = %self.machines[index].state(),
                "Event ignored by decision state machine"
            );
        }
        if let Some(key) = alias {
            self.aliases.entry(key).or_insert(index);
        }

        Ok(outcome.map(|outcome| Resolution { id, outcome }))
    }

    fn locate(&mut self, key: &RouteKey, event: &HistoryEvent) -> CoreResult<usize> {
        match key {
            RouteKey::Caller(id) => {
                self.by_id
                    .get(id)
                    .copied()
                    .ok_or_else(|| CoreError::UnknownDecision {
                        id: id.clone(),
                        event_id: event.event_id,
                        event_type: event.event_type(),
                    })
            }
            RouteKey::Alias(target, alias) => self
                .aliases
                .get(&(*target, *alias))
                .copied()
                .ok_or_else(|| CoreError::UnknownAlias {
                    target: *target,
                    alias: *alias,
                    event_id: event.event_id,
                    event_type: event.event_type(),
                }),
            RouteKey::NextUpsert => {
                self.pending_upserts
                    .pop_front()
                    .ok_or(CoreError::UnmatchedEvent {
                        event_id: event.event_id,
                        event_type: event.event_type(),
                    })
            }
        }
    }

    // ==== Collection ====

    /// Concatenate every machine's pending decisions in collection order.
    pub fn collect_pending_decisions(&mut self) -> Vec<Decision> {
        let mut decisions = Vec::new();
        for &index in &self.order {
            decisions.extend(self.machines[index].collect_pending_decisions());
        }
        let machines = &self.machines;
        self.order.retain(|&i| !machines[i].is_terminal());
        decisions
    }

    /// Mark everything pending as already sent. Used after replaying a batch
    /// whose decisions the orchestrator accepted.
    pub fn notify_decision_sent(&mut self) {
        for &index in &self.order {
            self.machines[index].mark_decisions_sent();
        }
        let machines = &self.machines;
        self.order.retain(|&i| !machines[i].is_terminal());
    }

    // ==== Inspection ====

    pub fn state_of(&self, id: &DecisionId) -> Option<DecisionState> {
        self.machine(id).map(|m| m.state())
    }

    pub fn machine(&self, id: &DecisionId) -> Option<&dyn DecisionStateMachine> {
        self.by_id.get(id).map(|&index| self.machines[index].as_ref())
    }

    pub fn contains(&self, id: &DecisionId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Whether `id` names a machine that has not reached a terminal state.
    pub fn is_live(&self, id: &DecisionId) -> bool {
        self.machine(id).map(|m| !m.is_terminal()).unwrap_or(false)
    }

    /// Number of machines that are not terminal.
    pub fn live_count(&self) -> usize {
        self.by_id
            .values()
            .filter(|&&index| !self.machines[index].is_terminal())
            .count()
    }
}

//! Decision state machines
//!
//! One machine tracks one orchestration primitive (activity, timer, child
//! workflow, marker, search attribute upsert, external cancel or signal) from
//! the moment workflow code asks for it until the orchestrator resolves it.
//!
//! ```text
//! Created ──► Initiated ──► Started ──► Completed
//!                │              │
//!          (cancel sent)  (cancel sent)
//!                ▼              ▼
//!   CanceledAfterInitiated  CanceledAfterStarted ──► CompletedAfterCancellationDecisionSent
//! ```
//!
//! Machines never react to another machine's event: every handler checks the
//! event against the caller id (initiating events) or the learned initiated
//! event id (everything later) and ignores it otherwise.

use super::types::*;
use crate::history::{EventAttributes, HistoryEvent, Payload, TimeoutType, WorkflowExecution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// Lifecycle state of a decision state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    Created,
    Initiated,
    Started,
    CanceledAfterInitiated,
    CanceledAfterStarted,
    CompletedAfterCancellationDecisionSent,
    Completed,
}

impl DecisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DecisionState::Completed
                | DecisionState::CompletedAfterCancellationDecisionSent
                | DecisionState::CanceledAfterInitiated
                | DecisionState::CanceledAfterStarted
        )
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State and flags shared by every machine kind.
#[derive(Debug, Clone)]
pub struct MachineCore {
    id: DecisionId,
    state: DecisionState,
    initiated_event_id: Option<i64>,
    started_event_id: Option<i64>,
    initial_emitted: bool,
    cancel_requested: bool,
    cancel_emitted: bool,
}

impl MachineCore {
    pub fn new(id: DecisionId) -> Self {
        Self {
            id,
            state: DecisionState::Created,
            initiated_event_id: None,
            started_event_id: None,
            initial_emitted: false,
            cancel_requested: false,
            cancel_emitted: false,
        }
    }

    pub fn id(&self) -> &DecisionId {
        &self.id
    }

    pub fn state(&self) -> DecisionState {
        self.state
    }

    pub fn initiated_event_id(&self) -> Option<i64> {
        self.initiated_event_id
    }

    pub fn started_event_id(&self) -> Option<i64> {
        self.started_event_id
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    fn transition(&mut self, to: DecisionState) {
        trace!(decision_id = %self.id, from = %self.state, to = %to, "Decision state transition");
        self.state = to;
    }

    fn references(&self, initiated_event_id: i64) -> bool {
        self.initiated_event_id == Some(initiated_event_id)
    }

    fn request_cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.cancel_requested = true;
        true
    }

    fn cancel_pending(&self) -> bool {
        self.cancel_requested && !self.cancel_emitted && !self.state.is_terminal()
    }

    fn collect(&mut self, initial: Option<Decision>, cancel: Option<Decision>) -> Vec<Decision> {
        let mut decisions = Vec::new();
        if !self.initial_emitted {
            decisions.extend(initial);
            self.initial_emitted = true;
        }
        if self.cancel_pending() {
            decisions.extend(cancel);
            self.cancel_emitted = true;
            match self.state {
                DecisionState::Initiated => self.transition(DecisionState::CanceledAfterInitiated),
                DecisionState::Started => self.transition(DecisionState::CanceledAfterStarted),
                _ => {}
            }
        }
        decisions
    }

    fn on_initiated(&mut self, event_id: i64) -> bool {
        if self.state != DecisionState::Created {
            return false;
        }
        self.initiated_event_id = Some(event_id);
        self.initial_emitted = true;
        if self.cancel_emitted {
            self.transition(DecisionState::CanceledAfterInitiated);
        } else {
            self.transition(DecisionState::Initiated);
        }
        true
    }

    fn on_started(&mut self, event_id: i64) -> bool {
        match self.state {
            DecisionState::Initiated => self.transition(DecisionState::Started),
            DecisionState::CanceledAfterInitiated => {
                self.transition(DecisionState::CanceledAfterStarted)
            }
            _ => return false,
        }
        self.started_event_id = Some(event_id);
        true
    }

    fn on_completion(&mut self) -> bool {
        match self.state {
            DecisionState::Initiated | DecisionState::Started => {
                self.transition(DecisionState::Completed)
            }
            DecisionState::CanceledAfterInitiated | DecisionState::CanceledAfterStarted => {
                self.transition(DecisionState::CompletedAfterCancellationDecisionSent)
            }
            _ => return false,
        }
        true
    }

    /// Completion of machines whose initiating event is also their last.
    fn on_recorded(&mut self, event_id: i64) -> bool {
        if !self.on_initiated(event_id) {
            return false;
        }
        self.transition(DecisionState::Completed);
        true
    }

    fn on_canceled(&mut self) -> bool {
        match self.state {
            DecisionState::Initiated | DecisionState::CanceledAfterInitiated => {
                self.transition(DecisionState::CanceledAfterInitiated)
            }
            DecisionState::Started | DecisionState::CanceledAfterStarted => {
                self.transition(DecisionState::CanceledAfterStarted)
            }
            _ => return false,
        }
        true
    }

    fn on_cancel_failed(&mut self) -> bool {
        match self.state {
            DecisionState::CanceledAfterInitiated => self.transition(DecisionState::Initiated),
            DecisionState::CanceledAfterStarted => self.transition(DecisionState::Started),
            _ => return false,
        }
        self.cancel_requested = false;
        self.cancel_emitted = false;
        true
    }
}

/// Behaviour every machine kind provides.
///
/// Handlers return whether the event was accepted (or the outcome it
/// resolved). A `false`/`None` result means the event did not belong to this
/// machine, or arrived in a state where it has no effect.
pub trait DecisionStateMachine: fmt::Debug + Send {
    fn core(&self) -> &MachineCore;

    fn core_mut(&mut self) -> &mut MachineCore;

    /// The schedule/start decision.
    fn initial_decision(&self) -> Decision;

    /// The decision that asks the orchestrator to cancel, if the kind has one.
    fn cancel_decision(&self) -> Option<Decision> {
        None
    }

    fn id(&self) -> &DecisionId {
        self.core().id()
    }

    fn state(&self) -> DecisionState {
        self.core().state()
    }

    fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Ask for cancellation. Takes effect when the cancel decision is
    /// collected. Returns false when the machine is terminal or the kind
    /// cannot be cancelled.
    fn request_cancel(&mut self) -> bool {
        if self.cancel_decision().is_none() {
            return false;
        }
        self.core_mut().request_cancel()
    }

    /// Decisions implied by the current flags, each returned at most once.
    fn collect_pending_decisions(&mut self) -> Vec<Decision> {
        let initial = if self.core().initial_emitted {
            None
        } else {
            Some(self.initial_decision())
        };
        let cancel = if self.core().cancel_pending() {
            self.cancel_decision()
        } else {
            None
        };
        self.core_mut().collect(initial, cancel)
    }

    /// Record that pending decisions already reached the orchestrator.
    fn mark_decisions_sent(&mut self) {
        let _ = self.collect_pending_decisions();
    }

    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool;

    fn handle_started(&mut self, _event: &HistoryEvent) -> bool {
        false
    }

    fn handle_completion(&mut self, _event: &HistoryEvent) -> Option<Outcome> {
        None
    }

    fn handle_canceled(&mut self, _event: &HistoryEvent) -> Option<Outcome> {
        None
    }

    /// The orchestrator recorded this machine's cancel decision.
    fn handle_cancel_initiated(&mut self, _event: &HistoryEvent) -> bool {
        false
    }

    fn handle_cancel_failed(&mut self, _event: &HistoryEvent) -> bool {
        false
    }
}

fn timeout_reason(timeout_type: TimeoutType) -> String {
    format!("TIMEOUT_{}", timeout_type.as_str())
}

// ==== Activity ====

#[derive(Debug)]
pub struct ActivityStateMachine {
    core: MachineCore,
    attributes: ScheduleActivityTaskDecisionAttributes,
}

impl ActivityStateMachine {
    pub fn new(attributes: ScheduleActivityTaskDecisionAttributes) -> Self {
        Self {
            core: MachineCore::new(DecisionId::activity(attributes.activity_id.clone())),
            attributes,
        }
    }
}

impl DecisionStateMachine for ActivityStateMachine {
    fn core(&self) -> &MachineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MachineCore {
        &mut self.core
    }

    fn initial_decision(&self) -> Decision {
        Decision::ScheduleActivityTask(self.attributes.clone())
    }

    fn cancel_decision(&self) -> Option<Decision> {
        Some(Decision::RequestCancelActivityTask {
            activity_id: self.attributes.activity_id.clone(),
        })
    }

    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::ActivityTaskScheduled(a) if a.activity_id == self.core.id.id => {
                self.core.on_initiated(event.event_id)
            }
            _ => false,
        }
    }

    fn handle_started(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::ActivityTaskStarted(a) if self.core.references(a.scheduled_event_id) => {
                self.core.on_started(event.event_id)
            }
            _ => false,
        }
    }

    fn handle_completion(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        let (scheduled_event_id, outcome) = match &event.attributes {
            EventAttributes::ActivityTaskCompleted(a) => {
                (a.scheduled_event_id, Outcome::Completed(a.result.clone()))
            }
            EventAttributes::ActivityTaskFailed(a) => (
                a.scheduled_event_id,
                Outcome::failed(a.reason.clone(), a.details.clone()),
            ),
            EventAttributes::ActivityTaskTimedOut(a) => (
                a.scheduled_event_id,
                Outcome::failed(timeout_reason(a.timeout_type), a.details.clone()),
            ),
            _ => return None,
        };
        (self.core.references(scheduled_event_id) && self.core.on_completion()).then_some(outcome)
    }

    fn handle_canceled(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        match &event.attributes {
            EventAttributes::ActivityTaskCanceled(a) if self.core.references(a.scheduled_event_id) => {
                self.core
                    .on_canceled()
                    .then(|| Outcome::Canceled(a.details.clone()))
            }
            _ => None,
        }
    }

    fn handle_cancel_initiated(&mut self, event: &HistoryEvent) -> bool {
        matches!(
            &event.attributes,
            EventAttributes::ActivityTaskCancelRequested(a)
                if a.activity_id == self.core.id.id && self.core.cancel_emitted
        )
    }

    fn handle_cancel_failed(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::RequestCancelActivityTaskFailed(a) if a.activity_id == self.core.id.id => {
                self.core.on_cancel_failed()
            }
            _ => false,
        }
    }
}

// ==== Timer ====

#[derive(Debug)]
pub struct TimerStateMachine {
    core: MachineCore,
    attributes: StartTimerDecisionAttributes,
}

impl TimerStateMachine {
    pub fn new(attributes: StartTimerDecisionAttributes) -> Self {
        Self {
            core: MachineCore::new(DecisionId::timer(attributes.timer_id.clone())),
            attributes,
        }
    }
}

impl DecisionStateMachine for TimerStateMachine {
    fn core(&self) -> &MachineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MachineCore {
        &mut self.core
    }

    fn initial_decision(&self) -> Decision {
        Decision::StartTimer(self.attributes.clone())
    }

    fn cancel_decision(&self) -> Option<Decision> {
        Some(Decision::CancelTimer {
            timer_id: self.attributes.timer_id.clone(),
        })
    }

    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::TimerStarted(t) if t.timer_id == self.core.id.id => {
                self.core.on_initiated(event.event_id)
            }
            _ => false,
        }
    }

    fn handle_completion(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        match &event.attributes {
            EventAttributes::TimerFired(t) if self.core.references(t.started_event_id) => {
                self.core.on_completion().then_some(Outcome::Completed(None))
            }
            _ => None,
        }
    }

    fn handle_canceled(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        match &event.attributes {
            EventAttributes::TimerCanceled(t) if self.core.references(t.started_event_id) => {
                self.core.on_canceled().then_some(Outcome::Canceled(None))
            }
            _ => None,
        }
    }

    fn handle_cancel_failed(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::CancelTimerFailed(t) if t.timer_id == self.core.id.id => {
                self.core.on_cancel_failed()
            }
            _ => false,
        }
    }
}

// ==== Child workflow ====

#[derive(Debug)]
pub struct ChildWorkflowStateMachine {
    core: MachineCore,
    attributes: StartChildWorkflowExecutionDecisionAttributes,
    run_id: Option<String>,
    cancel_initiated_event_id: Option<i64>,
}

impl ChildWorkflowStateMachine {
    pub fn new(attributes: StartChildWorkflowExecutionDecisionAttributes) -> Self {
        Self {
            core: MachineCore::new(DecisionId::child_workflow(attributes.workflow_id.clone())),
            attributes,
            run_id: None,
            cancel_initiated_event_id: None,
        }
    }

    /// Run id learned from `ChildWorkflowExecutionStarted`.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }
}

impl DecisionStateMachine for ChildWorkflowStateMachine {
    fn core(&self) -> &MachineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MachineCore {
        &mut self.core
    }

    fn initial_decision(&self) -> Decision {
        Decision::StartChildWorkflowExecution(self.attributes.clone())
    }

    fn cancel_decision(&self) -> Option<Decision> {
        Some(Decision::RequestCancelExternalWorkflowExecution(
            RequestCancelExternalWorkflowExecutionDecisionAttributes {
                domain: self.attributes.domain.clone(),
                workflow_id: self.attributes.workflow_id.clone(),
                run_id: self.run_id.clone().unwrap_or_default(),
                control: String::new(),
                child_workflow_only: true,
            },
        ))
    }

    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::StartChildWorkflowExecutionInitiated(c)
                if c.workflow_id == self.core.id.id =>
            {
                self.core.on_initiated(event.event_id)
            }
            _ => false,
        }
    }

    fn handle_started(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::ChildWorkflowExecutionStarted(c)
                if self.core.references(c.initiated_event_id) =>
            {
                let accepted = self.core.on_started(event.event_id);
                if accepted {
                    self.run_id = Some(c.workflow_execution.run_id.clone());
                }
                accepted
            }
            _ => false,
        }
    }

    fn handle_completion(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        let (initiated_event_id, outcome) = match &event.attributes {
            EventAttributes::StartChildWorkflowExecutionFailed(c) => {
                (c.initiated_event_id, Outcome::failed(c.cause.clone(), None))
            }
            EventAttributes::ChildWorkflowExecutionCompleted(c) => {
                (c.initiated_event_id, Outcome::Completed(c.result.clone()))
            }
            EventAttributes::ChildWorkflowExecutionFailed(c) => (
                c.initiated_event_id,
                Outcome::failed(c.reason.clone(), c.details.clone()),
            ),
            EventAttributes::ChildWorkflowExecutionTimedOut(c) => (
                c.initiated_event_id,
                Outcome::failed(timeout_reason(c.timeout_type), None),
            ),
            EventAttributes::ChildWorkflowExecutionTerminated(c) => {
                (c.initiated_event_id, Outcome::failed("TERMINATED", None))
            }
            _ => return None,
        };
        (self.core.references(initiated_event_id) && self.core.on_completion()).then_some(outcome)
    }

    fn handle_canceled(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        match &event.attributes {
            EventAttributes::ChildWorkflowExecutionCanceled(c)
                if self.core.references(c.initiated_event_id) =>
            {
                self.core
                    .on_canceled()
                    .then(|| Outcome::Canceled(c.details.clone()))
            }
            _ => None,
        }
    }

    fn handle_cancel_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(c)
                if c.child_workflow_only
                    && c.workflow_execution.workflow_id == self.core.id.id
                    && self.core.cancel_emitted =>
            {
                self.cancel_initiated_event_id = Some(event.event_id);
                true
            }
            _ => false,
        }
    }

    fn handle_cancel_failed(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::RequestCancelExternalWorkflowExecutionFailed(c)
                if self.cancel_initiated_event_id == Some(c.initiated_event_id) =>
            {
                self.core.on_cancel_failed()
            }
            _ => false,
        }
    }
}

// ==== Marker ====

#[derive(Debug)]
pub struct MarkerStateMachine {
    core: MachineCore,
    attributes: RecordMarkerDecisionAttributes,
}

impl MarkerStateMachine {
    pub fn new(attributes: RecordMarkerDecisionAttributes) -> Self {
        Self {
            core: MachineCore::new(DecisionId::new(
                DecisionTarget::Marker,
                attributes.marker_id.clone(),
            )),
            attributes,
        }
    }
}

impl DecisionStateMachine for MarkerStateMachine {
    fn core(&self) -> &MachineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MachineCore {
        &mut self.core
    }

    fn initial_decision(&self) -> Decision {
        Decision::RecordMarker(self.attributes.clone())
    }

    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::MarkerRecorded(m) if m.marker_id == self.core.id.id => {
                self.core.on_recorded(event.event_id)
            }
            _ => false,
        }
    }
}

// ==== Upsert search attributes ====

#[derive(Debug)]
pub struct UpsertSearchAttributesStateMachine {
    core: MachineCore,
    search_attributes: BTreeMap<String, Payload>,
}

impl UpsertSearchAttributesStateMachine {
    pub fn new(id: impl Into<String>, search_attributes: BTreeMap<String, Payload>) -> Self {
        Self {
            core: MachineCore::new(DecisionId::new(DecisionTarget::UpsertSearchAttributes, id)),
            search_attributes,
        }
    }
}

impl DecisionStateMachine for UpsertSearchAttributesStateMachine {
    fn core(&self) -> &MachineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MachineCore {
        &mut self.core
    }

    fn initial_decision(&self) -> Decision {
        Decision::UpsertWorkflowSearchAttributes(UpsertWorkflowSearchAttributesDecisionAttributes {
            search_attributes: self.search_attributes.clone(),
        })
    }

    // The event carries no caller id; the manager matches upserts in order.
    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::UpsertWorkflowSearchAttributes(_) => {
                self.core.on_recorded(event.event_id)
            }
            _ => false,
        }
    }
}

// ==== Signal external workflow ====

#[derive(Debug)]
pub struct SignalExternalStateMachine {
    core: MachineCore,
    attributes: SignalExternalWorkflowExecutionDecisionAttributes,
}

impl SignalExternalStateMachine {
    /// `attributes.control` carries the caller id.
    pub fn new(attributes: SignalExternalWorkflowExecutionDecisionAttributes) -> Self {
        Self {
            core: MachineCore::new(DecisionId::new(
                DecisionTarget::SignalExternalWorkflow,
                attributes.control.clone(),
            )),
            attributes,
        }
    }

    pub fn execution(&self) -> &WorkflowExecution {
        &self.attributes.execution
    }
}

impl DecisionStateMachine for SignalExternalStateMachine {
    fn core(&self) -> &MachineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MachineCore {
        &mut self.core
    }

    fn initial_decision(&self) -> Decision {
        Decision::SignalExternalWorkflowExecution(self.attributes.clone())
    }

    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::SignalExternalWorkflowExecutionInitiated(s)
                if s.control == self.core.id.id =>
            {
                self.core.on_initiated(event.event_id)
            }
            _ => false,
        }
    }

    fn handle_completion(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        let (initiated_event_id, outcome) = match &event.attributes {
            EventAttributes::ExternalWorkflowExecutionSignaled(s) => {
                (s.initiated_event_id, Outcome::Completed(None))
            }
            EventAttributes::SignalExternalWorkflowExecutionFailed(s) => {
                (s.initiated_event_id, Outcome::failed(s.cause.clone(), None))
            }
            _ => return None,
        };
        (self.core.references(initiated_event_id) && self.core.on_completion()).then_some(outcome)
    }
}

// ==== Cancel external workflow ====

#[derive(Debug)]
pub struct CancelExternalStateMachine {
    core: MachineCore,
    attributes: RequestCancelExternalWorkflowExecutionDecisionAttributes,
}

impl CancelExternalStateMachine {
    /// `attributes.control` carries the caller id.
    pub fn new(attributes: RequestCancelExternalWorkflowExecutionDecisionAttributes) -> Self {
        Self {
            core: MachineCore::new(DecisionId::new(
                DecisionTarget::CancelExternalWorkflow,
                attributes.control.clone(),
            )),
            attributes,
        }
    }
}

impl DecisionStateMachine for CancelExternalStateMachine {
    fn core(&self) -> &MachineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MachineCore {
        &mut self.core
    }

    fn initial_decision(&self) -> Decision {
        Decision::RequestCancelExternalWorkflowExecution(self.attributes.clone())
    }

    fn handle_initiated(&mut self, event: &HistoryEvent) -> bool {
        match &event.attributes {
            EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(c)
                if !c.child_workflow_only && c.control == self.core.id.id =>
            {
                self.core.on_initiated(event.event_id)
            }
            _ => false,
        }
    }

    fn handle_completion(&mut self, event: &HistoryEvent) -> Option<Outcome> {
        let (initiated_event_id, outcome) = match &event.attributes {
            EventAttributes::ExternalWorkflowExecutionCancelRequested(c) => {
                (c.initiated_event_id, Outcome::Completed(None))
            }
            EventAttributes::RequestCancelExternalWorkflowExecutionFailed(c) => {
                (c.initiated_event_id, Outcome::failed(c.cause.clone(), None))
            }
            _ => return None,
        };
        (self.core.references(initiated_event_id) && self.core.on_completion()).then_some(outcome)
    }
}

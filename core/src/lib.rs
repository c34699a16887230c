//! # Cadence Core
//!
//! Replay core for Cadence workflow deciders.
//!
//! This crate turns a workflow run's history into the state of its in-flight
//! decisions. It is synchronous and performs no I/O: callers hand it events
//! and take decisions back.
//!
//! ## What's in Core vs SDK
//!
//! **Core** contains the protocol-level pieces:
//! - History events and decision tasks
//! - The decision events iterator that batches history per decision task
//! - Decision state machines for activities, timers, child workflows,
//!   markers, search attribute upserts and external workflow requests
//! - The decision manager that correlates events with state machines
//!
//! **SDK** contains everything that runs workflow code:
//! - Deterministic scheduler and workflow context
//! - Workflow engine and engine cache
//! - Decision task handling against history and decision collaborators
//!
//! ## Modules
//!
//! - [`history`] - History events, decision tasks, batching iterator, builder
//! - [`decision`] - Decisions, state machines and the decision manager
//! - [`error`] - Core error types

pub mod decision;
pub mod error;
pub mod history;

// Re-export error types
pub use error::{CoreError, CoreResult};

// Re-export history types
pub use history::{
    DecisionEvents, DecisionEventsIterator, DecisionTask, EventAttributes, EventType,
    HistoryBuilder, HistoryEvent, HistoryPage, NextBatch, Payload, TimeoutType,
    WorkflowExecution,
};

// Re-export decision types
pub use decision::{
    Decision, DecisionId, DecisionManager, DecisionState, DecisionStateMachine, DecisionTarget,
    Failure, Outcome, Resolution,
};

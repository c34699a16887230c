//! Cadence SDK for Rust
//!
//! This SDK runs workflow deciders for Cadence: it replays a workflow run's
//! history through user workflow code on a deterministic single-threaded
//! scheduler, and turns each decision task into the list of decisions the
//! server should act on.
//!
//! The protocol pieces (history, decision state machines, batching) live in
//! [`cadence_core`]; this crate owns workflow execution and task handling.

#![allow(clippy::result_large_err)]

pub mod common;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod worker;
pub mod workflow;

// Re-export commonly used types
pub use error::{CadenceError, Result};

// Re-export config types
pub use config::{ConfigError, DecisionWorkerConfig};

// Re-export codec types
pub use common::codec::{JsonCodec, PayloadCodec};

// Re-export workflow types
pub use workflow::context::{ActivityOptions, ChildWorkflowOptions, WorkflowContext};
pub use workflow::definition::{WorkflowDefinition, WorkflowFn, WorkflowInfo};
pub use workflow::engine::{DecisionTaskCompletion, WorkflowEngine};
pub use workflow::future::{
    ActivityFuture, CancellableFuture, ChildWorkflowFuture, ExternalFuture, TimerFuture,
};

// Re-export worker types
pub use worker::{
    CompletedDecisionTask, DecisionSink, DecisionTaskFailedCause, DecisionTaskHandler,
    FailedDecisionTask, HandledDecisionTask, HistorySource, WorkflowCache, WorkflowRegistry,
};

// Re-export telemetry types
pub use telemetry::{InMemoryMetrics, MetricsSink, NoopMetrics};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::DecisionWorkerConfig;
    pub use crate::error::{CadenceError, Result};
    pub use crate::worker::{
        DecisionSink, DecisionTaskHandler, HistorySource, WorkflowRegistry,
    };
    pub use crate::workflow::context::{ActivityOptions, ChildWorkflowOptions, WorkflowContext};
    pub use crate::workflow::definition::{workflow_fn, WorkflowDefinition};
    pub use crate::workflow::future::CancellableFuture;
    pub use async_trait::async_trait;
    pub use cadence_core::{DecisionTask, HistoryPage, WorkflowExecution};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Map, Value};
    pub use uuid::Uuid;
}

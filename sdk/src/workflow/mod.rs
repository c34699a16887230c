//! Workflow runtime: scheduler, context, futures, definitions and the
//! replay engine.

pub mod context;
pub mod definition;
pub mod engine;
pub mod future;
pub mod random;
pub mod scheduler;

pub use context::{ActivityOptions, ChildWorkflowOptions, WorkflowContext, SIDE_EFFECT_MARKER_NAME};
pub use definition::{definition_fn, workflow_fn, WorkflowDefinition, WorkflowFn, WorkflowInfo};
pub use engine::{classify_error, DecisionTaskCompletion, WorkflowEngine};
pub use future::{
    ActivityFuture, CancellableFuture, ChildWorkflowFuture, ExternalFuture, TimerFuture,
};
pub use random::SeededRandom;
pub use scheduler::{
    DeterministicScheduler, JoinHandle, Placeholder, PlaceholderId, RunReport, SchedulerHandle,
    TaskFailure, TaskId,
};

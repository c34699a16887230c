//! Decision task processing: workflow registry, engine cache and handler

pub mod cache;
pub mod handler;
pub mod registry;

pub use cache::{SharedEngine, WorkflowCache};
pub use handler::{
    CompletedDecisionTask, DecisionSink, DecisionTaskFailedCause, DecisionTaskHandler,
    FailedDecisionTask, HandledDecisionTask, HistorySource,
};
pub use registry::WorkflowRegistry;

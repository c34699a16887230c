//! History model: events, decision tasks, and the batching iterator.

pub mod builder;
pub mod event;
pub mod iterator;
pub mod task;

pub use builder::HistoryBuilder;
pub use event::{EventAttributes, EventType, HistoryEvent, Payload, TimeoutType, WorkflowExecution};
pub use iterator::{DecisionEvents, DecisionEventsIterator, NextBatch};
pub use task::{DecisionTask, HistoryPage};

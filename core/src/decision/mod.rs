//! Decisions, their state machines, and the manager that correlates them
//! with history events.

pub mod manager;
pub mod state_machine;
pub mod types;

pub use manager::DecisionManager;
pub use state_machine::{
    ActivityStateMachine, CancelExternalStateMachine, ChildWorkflowStateMachine, DecisionState,
    DecisionStateMachine, MachineCore, MarkerStateMachine, SignalExternalStateMachine,
    TimerStateMachine, UpsertSearchAttributesStateMachine,
};
pub use types::*;

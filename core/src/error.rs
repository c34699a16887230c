//! Core error types for the replay core
//!
//! Every error in this module invalidates the decision task being processed.
//! Mismatches between a single state machine and an event are not errors; they
//! are ignored where they happen.

use crate::decision::{DecisionId, DecisionTarget};
use crate::history::EventType;

/// Core error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An initiating event names a decision no state machine owns
    #[error("event {event_id} ({event_type:?}) references unknown decision {id}")]
    UnknownDecision {
        id: DecisionId,
        event_id: i64,
        event_type: EventType,
    },

    /// A follow-on event carries a server-assigned id that was never learned
    #[error("event {event_id} ({event_type:?}) references unknown {target:?} event id {alias}")]
    UnknownAlias {
        target: DecisionTarget,
        alias: i64,
        event_id: i64,
        event_type: EventType,
    },

    /// A decision event arrived with no pending decision to match it
    #[error("event {event_id} ({event_type:?}) matches no pending decision")]
    UnmatchedEvent { event_id: i64, event_type: EventType },

    /// History that violates protocol ordering rules
    #[error("Malformed history: {0}")]
    MalformedHistory(String),
}

impl CoreError {
    /// Whether this error means the history and the in-memory state machines
    /// disagree about which decisions exist.
    pub fn is_correlation_error(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownDecision { .. }
                | CoreError::UnknownAlias { .. }
                | CoreError::UnmatchedEvent { .. }
        )
    }

    /// The id of the offending event, when there is one.
    pub fn event_id(&self) -> Option<i64> {
        match self {
            CoreError::UnknownDecision { event_id, .. }
            | CoreError::UnknownAlias { event_id, .. }
            | CoreError::UnmatchedEvent { event_id, .. } => Some(*event_id),
            _ => None,
        }
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

//! Error types for the Cadence SDK

// Re-export core error types
pub use cadence_core::CoreError;

use cadence_core::Payload;

/// Main error type for the Cadence SDK
#[derive(Debug, thiserror::Error)]
pub enum CadenceError {
    /// Activity completed with a failure or timed out
    #[error("Activity failed: {activity_id}: {reason}")]
    ActivityFailed {
        activity_id: String,
        reason: String,
        details: Option<Payload>,
    },

    /// Child workflow failed to start, failed, timed out or was terminated
    #[error("Child workflow failed: {workflow_id}: {reason}")]
    ChildWorkflowFailed {
        workflow_id: String,
        reason: String,
        details: Option<Payload>,
    },

    /// Signal or cancel request to another workflow was rejected
    #[error("External workflow request failed: {workflow_id}: {cause}")]
    ExternalWorkflowFailed { workflow_id: String, cause: String },

    /// Operation was cancelled
    #[error("Canceled: {0}")]
    Canceled(String),

    /// Workflow code failed the run with an explicit reason
    #[error("Workflow failed: {reason}")]
    WorkflowFailed {
        reason: String,
        details: Option<Payload>,
    },

    /// Non-retryable error (permanent failure)
    #[error("Non-retryable error: {0}")]
    NonRetryable(String),

    /// A workflow task panicked while being polled
    #[error("Workflow task panicked: {0}")]
    Panicked(String),

    /// History and workflow code disagree, or history is malformed
    #[error("Replay error: {0}")]
    Replay(#[from] CoreError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// Cached workflow state does not match history and only part of the
    /// history was supplied to rebuild it
    #[error("Stale workflow state: {0}")]
    StaleState(String),

    /// History pages could not be fetched
    #[error("History unavailable: {0}")]
    HistoryUnavailable(String),

    /// Workflow definition not found
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CadenceError {
    /// Fail the workflow run with a reason of the caller's choosing.
    pub fn workflow_failed(reason: impl Into<String>) -> Self {
        CadenceError::WorkflowFailed {
            reason: reason.into(),
            details: None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, CadenceError::Canceled(_))
    }
}

/// Result type alias for Cadence SDK operations
pub type Result<T> = std::result::Result<T, CadenceError>;

//! Futures returned by the workflow context.
//!
//! Each future waits on a scheduler placeholder that the engine resolves when
//! history reports the outcome of the decision behind it, and converts that
//! outcome into a typed result.

use crate::common::codec::decode_value;
use crate::error::{CadenceError, Result};
use crate::workflow::context::WorkflowContext;
use crate::workflow::scheduler::Placeholder;
use cadence_core::{DecisionId, Outcome};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{ready, Context, Poll};

/// Trait for workflow futures that can be cancelled.
///
/// Cancelling never drops the operation. It asks the decision state machine
/// that owns it to cancel, and the future resolves when the outcome is known.
pub trait CancellableFuture: Future {
    /// Request cancellation.
    ///
    /// Timers resolve immediately with [`CadenceError::Canceled`]. Activities
    /// and child workflows resolve once the orchestrator confirms, and may
    /// still complete normally if they finish first. Requests to external
    /// workflows cannot be cancelled.
    fn cancel(&self);

    /// Whether a cancellation request was accepted.
    fn is_cancelled(&self) -> bool;
}

struct Pending {
    placeholder: Placeholder<Outcome>,
    ctx: WorkflowContext,
    cancelled: AtomicBool,
}

impl Pending {
    fn new(placeholder: Placeholder<Outcome>, ctx: WorkflowContext) -> Self {
        Self {
            placeholder,
            ctx,
            cancelled: AtomicBool::new(false),
        }
    }

    fn poll_outcome(&mut self, cx: &mut Context<'_>) -> Poll<Outcome> {
        Pin::new(&mut self.placeholder).poll(cx)
    }

    fn cancel(&self, id: &DecisionId) {
        if self.ctx.request_cancel(id) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// ActivityFuture
// ============================================================================

/// Future for a scheduled activity.
pub struct ActivityFuture<O> {
    id: DecisionId,
    pending: Pending,
    _marker: PhantomData<fn() -> O>,
}

impl<O> ActivityFuture<O> {
    pub(crate) fn new(id: DecisionId, placeholder: Placeholder<Outcome>, ctx: WorkflowContext) -> Self {
        Self {
            id,
            pending: Pending::new(placeholder, ctx),
            _marker: PhantomData,
        }
    }

    pub fn decision_id(&self) -> &DecisionId {
        &self.id
    }

    pub fn activity_id(&self) -> &str {
        &self.id.id
    }
}

impl<O: DeserializeOwned> Future for ActivityFuture<O> {
    type Output = Result<O>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(this.pending.poll_outcome(cx));
        Poll::Ready(match outcome {
            Outcome::Completed(result) => decode_value(this.pending.ctx.codec(), result.as_deref()),
            Outcome::Failed(failure) => Err(CadenceError::ActivityFailed {
                activity_id: this.id.id.clone(),
                reason: failure.reason,
                details: failure.details,
            }),
            Outcome::Canceled(_) => Err(CadenceError::Canceled(format!(
                "activity {} canceled",
                this.id.id
            ))),
        })
    }
}

impl<O: DeserializeOwned> CancellableFuture for ActivityFuture<O> {
    fn cancel(&self) {
        self.pending.cancel(&self.id);
    }

    fn is_cancelled(&self) -> bool {
        self.pending.is_cancelled()
    }
}

// ============================================================================
// TimerFuture
// ============================================================================

/// Future for a started timer.
pub struct TimerFuture {
    /// `None` for zero-length timers, which never reach the orchestrator.
    id: Option<DecisionId>,
    pending: Pending,
}

impl TimerFuture {
    pub(crate) fn new(
        id: Option<DecisionId>,
        placeholder: Placeholder<Outcome>,
        ctx: WorkflowContext,
    ) -> Self {
        Self {
            id,
            pending: Pending::new(placeholder, ctx),
        }
    }

    pub fn decision_id(&self) -> Option<&DecisionId> {
        self.id.as_ref()
    }
}

impl Future for TimerFuture {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(this.pending.poll_outcome(cx));
        let timer_id = this.id.as_ref().map(|id| id.id.as_str()).unwrap_or("");
        Poll::Ready(match outcome {
            Outcome::Completed(_) => Ok(()),
            Outcome::Canceled(_) => Err(CadenceError::Canceled(format!(
                "timer {} canceled",
                timer_id
            ))),
            Outcome::Failed(failure) => Err(CadenceError::Other(failure.reason)),
        })
    }
}

impl CancellableFuture for TimerFuture {
    fn cancel(&self) {
        if let Some(id) = &self.id {
            self.pending.cancel(id);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.pending.is_cancelled()
    }
}

// ============================================================================
// ChildWorkflowFuture
// ============================================================================

/// Future for a child workflow's result.
pub struct ChildWorkflowFuture<O> {
    id: DecisionId,
    pending: Pending,
    _marker: PhantomData<fn() -> O>,
}

impl<O> ChildWorkflowFuture<O> {
    pub(crate) fn new(id: DecisionId, placeholder: Placeholder<Outcome>, ctx: WorkflowContext) -> Self {
        Self {
            id,
            pending: Pending::new(placeholder, ctx),
            _marker: PhantomData,
        }
    }

    pub fn decision_id(&self) -> &DecisionId {
        &self.id
    }

    pub fn workflow_id(&self) -> &str {
        &self.id.id
    }
}

impl<O: DeserializeOwned> Future for ChildWorkflowFuture<O> {
    type Output = Result<O>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(this.pending.poll_outcome(cx));
        Poll::Ready(match outcome {
            Outcome::Completed(result) => decode_value(this.pending.ctx.codec(), result.as_deref()),
            Outcome::Failed(failure) => Err(CadenceError::ChildWorkflowFailed {
                workflow_id: this.id.id.clone(),
                reason: failure.reason,
                details: failure.details,
            }),
            Outcome::Canceled(_) => Err(CadenceError::Canceled(format!(
                "child workflow {} canceled",
                this.id.id
            ))),
        })
    }
}

impl<O: DeserializeOwned> CancellableFuture for ChildWorkflowFuture<O> {
    fn cancel(&self) {
        self.pending.cancel(&self.id);
    }

    fn is_cancelled(&self) -> bool {
        self.pending.is_cancelled()
    }
}

// ============================================================================
// ExternalFuture
// ============================================================================

/// Future for a signal or cancel request sent to another workflow.
pub struct ExternalFuture {
    id: DecisionId,
    workflow_id: String,
    pending: Pending,
}

impl ExternalFuture {
    pub(crate) fn new(
        id: DecisionId,
        workflow_id: String,
        placeholder: Placeholder<Outcome>,
        ctx: WorkflowContext,
    ) -> Self {
        Self {
            id,
            workflow_id,
            pending: Pending::new(placeholder, ctx),
        }
    }

    pub fn decision_id(&self) -> &DecisionId {
        &self.id
    }
}

impl Future for ExternalFuture {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(this.pending.poll_outcome(cx));
        Poll::Ready(match outcome {
            Outcome::Completed(_) => Ok(()),
            Outcome::Failed(failure) => Err(CadenceError::ExternalWorkflowFailed {
                workflow_id: this.workflow_id.clone(),
                cause: failure.reason,
            }),
            Outcome::Canceled(_) => Err(CadenceError::Canceled(format!(
                "request to {} canceled",
                this.workflow_id
            ))),
        })
    }
}

impl CancellableFuture for ExternalFuture {
    fn cancel(&self) {
        self.pending.cancel(&self.id);
    }

    fn is_cancelled(&self) -> bool {
        self.pending.is_cancelled()
    }
}

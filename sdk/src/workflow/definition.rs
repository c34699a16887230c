//! Workflow definitions
//!
//! A workflow is an async function of a [`WorkflowContext`] and its decoded
//! input. It can be written as a closure (see [`workflow_fn`]) or as a type
//! implementing [`WorkflowDefinition`].

use crate::common::codec::decode_value;
use crate::error::{CadenceError, Result};
use crate::workflow::context::WorkflowContext;
use async_trait::async_trait;
use cadence_core::{Payload, WorkflowExecution};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Static facts about the run a context belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowInfo {
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: String,
    pub domain: String,
    pub task_list: String,
}

/// Type-erased workflow entry point: raw input payload in, JSON result out.
pub type WorkflowFn =
    Arc<dyn Fn(WorkflowContext, Option<Payload>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap a typed async closure as a [`WorkflowFn`].
///
/// The input is decoded with the context's codec; a decoding failure fails
/// the workflow like any other error.
pub fn workflow_fn<I, O, F, Fut>(f: F) -> WorkflowFn
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(WorkflowContext, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    Arc::new(move |ctx: WorkflowContext, input: Option<Payload>| {
        match decode_value::<I>(ctx.codec(), input.as_deref()) {
            Ok(input) => {
                let run = f(ctx, input);
                async move { Ok::<_, CadenceError>(serde_json::to_value(run.await?)?) }.boxed()
            }
            Err(e) => future::ready(Err(e)).boxed(),
        }
    })
}

/// Definition of a workflow with typed input and output.
#[async_trait]
pub trait WorkflowDefinition: Send + Sync {
    /// Input type for the workflow
    type Input: DeserializeOwned + Send;
    /// Output type for the workflow
    type Output: Serialize + Send;

    /// Workflow type name this definition is registered under
    fn workflow_type(&self) -> &str;

    /// Execute the workflow with the given context and input
    async fn execute(&self, ctx: WorkflowContext, input: Self::Input) -> Result<Self::Output>;
}

/// Erase a [`WorkflowDefinition`] into a [`WorkflowFn`].
pub fn definition_fn<W>(definition: Arc<W>) -> WorkflowFn
where
    W: WorkflowDefinition + 'static,
{
    Arc::new(move |ctx: WorkflowContext, input: Option<Payload>| {
        let definition = Arc::clone(&definition);
        match decode_value::<W::Input>(ctx.codec(), input.as_deref()) {
            Ok(input) => async move {
                let output = definition.execute(ctx, input).await?;
                Ok::<_, CadenceError>(serde_json::to_value(output)?)
            }
            .boxed(),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    })
}

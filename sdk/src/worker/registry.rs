//! WorkflowRegistry - Registry for workflow functions

use crate::error::{CadenceError, Result};
use crate::workflow::context::WorkflowContext;
use crate::workflow::definition::{definition_fn, workflow_fn, WorkflowDefinition, WorkflowFn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Registry of the workflow types a worker can run.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, WorkflowFn>>,
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.registered_types())
            .finish()
    }
}

impl WorkflowRegistry {
    /// Create a new empty workflow registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type-erased workflow function
    pub fn register_raw(&self, workflow_type: &str, workflow: WorkflowFn) -> Result<()> {
        let mut workflows = self.workflows.write();

        if workflows.contains_key(workflow_type) {
            return Err(CadenceError::InvalidConfiguration(format!(
                "Workflow '{}' is already registered. Each workflow type must be unique within a worker.",
                workflow_type
            )));
        }

        workflows.insert(workflow_type.to_string(), workflow);
        Ok(())
    }

    /// Register a workflow definition under its own type name
    pub fn register<W>(&self, workflow: W) -> Result<()>
    where
        W: WorkflowDefinition + 'static,
    {
        let workflow_type = workflow.workflow_type().to_string();
        self.register_raw(&workflow_type, definition_fn(Arc::new(workflow)))
    }

    /// Register an async closure with typed input and output
    ///
    /// ```ignore
    /// registry.register_fn("greeting", |ctx, name: String| async move {
    ///     ctx.sleep(Duration::from_secs(1)).await?;
    ///     Ok(format!("hello {}", name))
    /// })?;
    /// ```
    pub fn register_fn<I, O, F, Fut>(&self, workflow_type: &str, f: F) -> Result<()>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(WorkflowContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        self.register_raw(workflow_type, workflow_fn(f))
    }

    /// Get a registered workflow by type name
    pub fn get(&self, workflow_type: &str) -> Option<WorkflowFn> {
        self.workflows.read().get(workflow_type).cloned()
    }

    /// Check if a workflow type is registered
    pub fn has(&self, workflow_type: &str) -> bool {
        self.workflows.read().contains_key(workflow_type)
    }

    /// All registered workflow type names, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.workflows.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.read().is_empty()
    }
}

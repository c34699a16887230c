//! Configuration presets for decision task processing
//!
//! This module provides the settings the decision task handler runs with,
//! with sensible defaults and presets for common deployments.

use std::time::Duration;

/// Configuration for decision task processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionWorkerConfig {
    /// Identity reported with every decision task response
    pub identity: String,
    /// Domain workflows run in; used for child workflows and external requests
    pub domain: String,
    /// Task list activities and child workflows default to
    pub task_list: String,
    /// Maximum number of workflow engines kept between decision tasks
    pub max_cached_workflows: usize,
    /// Page size requested when paging in history
    pub history_page_size: i32,
    /// Upper bound on history pages fetched for a single decision task
    pub max_history_pages: usize,
    /// Time allowed for a single history page request
    pub history_fetch_timeout: Duration,
}

impl Default for DecisionWorkerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl DecisionWorkerConfig {
    /// Default configuration suitable for most use cases
    pub const DEFAULT: Self = Self {
        identity: String::new(),
        domain: String::new(),
        task_list: String::new(),
        max_cached_workflows: 1000,
        history_page_size: 1000,
        max_history_pages: 1000,
        history_fetch_timeout: Duration::from_secs(10),
    };

    /// High-throughput configuration for workers hosting many runs
    pub const HIGH_THROUGHPUT: Self = Self {
        identity: String::new(),
        domain: String::new(),
        task_list: String::new(),
        max_cached_workflows: 10_000,
        history_page_size: 1000,
        max_history_pages: 1000,
        history_fetch_timeout: Duration::from_secs(10),
    };

    /// Low-resource configuration for development or constrained environments
    pub const LOW_RESOURCE: Self = Self {
        identity: String::new(),
        domain: String::new(),
        task_list: String::new(),
        max_cached_workflows: 50,
        history_page_size: 100,
        max_history_pages: 500,
        history_fetch_timeout: Duration::from_secs(30),
    };

    /// Create a new configuration with validation
    pub fn new(
        identity: impl Into<String>,
        max_cached_workflows: usize,
        history_page_size: i32,
        max_history_pages: usize,
    ) -> Result<Self, ConfigError> {
        if history_page_size <= 0 {
            return Err(ConfigError::InvalidValue(
                "history_page_size must be positive".to_string(),
            ));
        }
        if max_history_pages == 0 {
            return Err(ConfigError::InvalidValue(
                "max_history_pages must be positive".to_string(),
            ));
        }

        Ok(Self {
            identity: identity.into(),
            domain: String::new(),
            task_list: String::new(),
            max_cached_workflows,
            history_page_size,
            max_history_pages,
            history_fetch_timeout: Self::DEFAULT.history_fetch_timeout,
        })
    }

    /// Set the identity reported to the orchestrator
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Set the domain and task list this worker serves
    pub fn with_task_list(mut self, domain: impl Into<String>, task_list: impl Into<String>) -> Self {
        self.domain = domain.into();
        self.task_list = task_list.into();
        self
    }

    /// Set the engine cache size; zero disables caching
    pub fn with_max_cached_workflows(mut self, max: usize) -> Self {
        self.max_cached_workflows = max;
        self
    }

    /// Set the history page size
    pub fn with_history_page_size(mut self, page_size: i32) -> Self {
        self.history_page_size = page_size;
        self
    }

    /// Set the time allowed for each history page request
    pub fn with_history_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.history_fetch_timeout = timeout;
        self
    }

    /// Whether engines are kept between decision tasks
    pub fn caching_enabled(&self) -> bool {
        self.max_cached_workflows > 0
    }
}

/// Configuration error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

//! Cache of workflow engines kept between decision tasks.
//!
//! Keeping an engine lets the next decision task of the same run apply only
//! the new events. Dropping one is always safe: the next task for that run
//! rebuilds it from the full history.

use crate::workflow::engine::WorkflowEngine;
use cadence_core::WorkflowExecution;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared handle to a cached engine.
pub type SharedEngine = Arc<Mutex<WorkflowEngine>>;

struct Entry {
    engine: SharedEngine,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<WorkflowExecution, Entry>,
    clock: u64,
}

impl CacheInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Bounded, least-recently-used cache of engines keyed by run.
pub struct WorkflowCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl WorkflowCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, execution: &WorkflowExecution) -> bool {
        self.inner.lock().entries.contains_key(execution)
    }

    /// Look up an engine and mark it as recently used.
    pub fn get(&self, execution: &WorkflowExecution) -> Option<SharedEngine> {
        let mut inner = self.inner.lock();
        let now = inner.tick();
        let entry = inner.entries.get_mut(execution)?;
        entry.last_used = now;
        Some(Arc::clone(&entry.engine))
    }

    /// Insert or refresh an engine. Returns the run evicted to make room.
    pub fn insert(
        &self,
        execution: WorkflowExecution,
        engine: SharedEngine,
    ) -> Option<WorkflowExecution> {
        if self.capacity == 0 {
            return None;
        }
        let mut inner = self.inner.lock();
        let now = inner.tick();

        let mut evicted = None;
        if !inner.entries.contains_key(&execution) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                debug!(execution = %oldest, "Evicted least recently used workflow engine");
                evicted = Some(oldest);
            }
        }

        inner.entries.insert(
            execution,
            Entry {
                engine,
                last_used: now,
            },
        );
        evicted
    }

    /// Drop the engine for a run. Returns whether one was cached.
    pub fn evict(&self, execution: &WorkflowExecution) -> bool {
        let removed = self.inner.lock().entries.remove(execution).is_some();
        if removed {
            debug!(execution = %execution, "Evicted workflow engine");
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl std::fmt::Debug for WorkflowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

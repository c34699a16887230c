//! Deterministic scheduler for workflow code.
//!
//! Workflow code runs as a set of cooperative tasks on a single FIFO ready
//! queue. Tasks only ever wait on [`Placeholder`]s, which are resolved from
//! outside the scheduler by the engine as history is replayed. A call to
//! [`DeterministicScheduler::run_once`] polls ready tasks until none is left
//! and returns; it never blocks and never looks for new work itself.
//!
//! Given the same sequence of resolved placeholders, two runs of the same
//! workflow code poll their tasks in the same order and therefore make the
//! same decisions.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use tracing::{trace, warn};

/// Identifies a task spawned on a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Identifies a placeholder awaiting resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderId(u64);

#[derive(Default)]
struct ReadyQueue {
    queue: VecDeque<TaskId>,
    queued: HashSet<TaskId>,
}

impl ReadyQueue {
    fn push(&mut self, id: TaskId) {
        if self.queued.insert(id) {
            self.queue.push_back(id);
        }
    }

    fn pop(&mut self) -> Option<TaskId> {
        let id = self.queue.pop_front()?;
        self.queued.remove(&id);
        Some(id)
    }
}

struct TaskWaker {
    id: TaskId,
    ready: Arc<Mutex<ReadyQueue>>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.lock().push(self.id);
    }
}

struct Slot<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

struct Shared<T> {
    ready: Arc<Mutex<ReadyQueue>>,
    spawned: Mutex<Vec<(TaskId, BoxFuture<'static, ()>)>>,
    placeholders: Mutex<HashMap<PlaceholderId, Slot<T>>>,
    next_task: AtomicU64,
    next_placeholder: AtomicU64,
}

/// Cloneable handle used by workflow code and the engine to spawn tasks and
/// to create and resolve placeholders.
pub struct SchedulerHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SchedulerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for SchedulerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> SchedulerHandle<T> {
    /// Queue a future as a new task. It is first polled by the next
    /// `run_once`, after every task already in the ready queue.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let id = TaskId(self.shared.next_task.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(Mutex::new(JoinState {
            output: None,
            waker: None,
        }));

        let task_state = Arc::clone(&state);
        let task = async move {
            let output = future.await;
            let waker = {
                let mut state = task_state.lock();
                state.output = Some(output);
                state.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        };

        self.shared.spawned.lock().push((id, task.boxed()));
        self.shared.ready.lock().push(id);
        trace!(task_id = %id, "Spawned workflow task");

        JoinHandle { id, state }
    }

    /// Create an unresolved placeholder.
    pub fn placeholder(&self) -> Placeholder<T> {
        let id = PlaceholderId(self.shared.next_placeholder.fetch_add(1, Ordering::Relaxed));
        self.shared.placeholders.lock().insert(
            id,
            Slot {
                value: None,
                waker: None,
            },
        );
        Placeholder {
            id,
            shared: Arc::clone(&self.shared),
            done: false,
        }
    }

    /// Resolve a placeholder and wake the task waiting on it.
    ///
    /// Returns false when the placeholder no longer exists or was already
    /// resolved.
    pub fn resolve(&self, id: PlaceholderId, value: T) -> bool {
        let waker = {
            let mut placeholders = self.shared.placeholders.lock();
            let Some(slot) = placeholders.get_mut(&id) else {
                return false;
            };
            if slot.value.is_some() {
                return false;
            }
            slot.value = Some(value);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Number of placeholders created and not yet consumed or dropped.
    pub fn outstanding_placeholders(&self) -> usize {
        self.shared.placeholders.lock().len()
    }
}

/// A value that will be supplied from outside the scheduler.
#[must_use = "placeholders do nothing unless awaited"]
pub struct Placeholder<T> {
    id: PlaceholderId,
    shared: Arc<Shared<T>>,
    done: bool,
}

impl<T> Placeholder<T> {
    pub fn id(&self) -> PlaceholderId {
        self.id
    }
}

impl<T> Future for Placeholder<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if self.done {
            return Poll::Pending;
        }
        let mut placeholders = self.shared.placeholders.lock();
        let Some(slot) = placeholders.get_mut(&self.id) else {
            return Poll::Pending;
        };
        match slot.value.take() {
            Some(value) => {
                placeholders.remove(&self.id);
                drop(placeholders);
                self.done = true;
                Poll::Ready(value)
            }
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for Placeholder<T> {
    fn drop(&mut self) {
        if !self.done {
            self.shared.placeholders.lock().remove(&self.id);
        }
    }
}

impl<T> fmt::Debug for Placeholder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholder")
            .field("id", &self.id)
            .field("done", &self.done)
            .finish()
    }
}

struct JoinState<O> {
    output: Option<O>,
    waker: Option<Waker>,
}

/// Handle to the output of a spawned task.
pub struct JoinHandle<O> {
    id: TaskId,
    state: Arc<Mutex<JoinState<O>>>,
}

impl<O> JoinHandle<O> {
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Take the output if the task has finished.
    pub fn try_take(&self) -> Option<O> {
        self.state.lock().output.take()
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().output.is_some()
    }
}

impl<O> Future for JoinHandle<O> {
    type Output = O;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<O> {
        let mut state = self.state.lock();
        match state.output.take() {
            Some(output) => Poll::Ready(output),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<O> fmt::Debug for JoinHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle").field("id", &self.id).finish()
    }
}

/// A task that panicked while being polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub message: String,
}

/// What one `run_once` call did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub polls: usize,
    pub completed: Vec<TaskId>,
    pub failures: Vec<TaskFailure>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Owner of the tasks of one workflow run.
pub struct DeterministicScheduler<T> {
    shared: Arc<Shared<T>>,
    tasks: HashMap<TaskId, BoxFuture<'static, ()>>,
}

impl<T: Send + 'static> Default for DeterministicScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> DeterministicScheduler<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                ready: Arc::new(Mutex::new(ReadyQueue::default())),
                spawned: Mutex::new(Vec::new()),
                placeholders: Mutex::new(HashMap::new()),
                next_task: AtomicU64::new(1),
                next_placeholder: AtomicU64::new(1),
            }),
            tasks: HashMap::new(),
        }
    }

    pub fn handle(&self) -> SchedulerHandle<T> {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Tasks that have not finished or panicked.
    pub fn live_tasks(&self) -> usize {
        self.tasks.len() + self.shared.spawned.lock().len()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.ready.lock().queue.is_empty()
    }

    /// Poll ready tasks in FIFO order until the ready queue is empty.
    ///
    /// A panicking task is dropped and reported in the returned
    /// [`RunReport`]; the remaining tasks keep running.
    pub fn run_once(&mut self) -> RunReport {
        let mut report = RunReport::default();

        loop {
            self.adopt_spawned();
            let Some(id) = self.shared.ready.lock().pop() else {
                break;
            };
            let Some(mut task) = self.tasks.remove(&id) else {
                continue;
            };

            let waker = Waker::from(Arc::new(TaskWaker {
                id,
                ready: Arc::clone(&self.shared.ready),
            }));
            let mut cx = Context::from_waker(&waker);
            report.polls += 1;

            match catch_unwind(AssertUnwindSafe(|| task.as_mut().poll(&mut cx))) {
                Ok(Poll::Ready(())) => {
                    trace!(task_id = %id, "Workflow task finished");
                    report.completed.push(id);
                }
                Ok(Poll::Pending) => {
                    self.tasks.insert(id, task);
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(task_id = %id, panic = %message, "Workflow task panicked");
                    report.failures.push(TaskFailure {
                        task_id: id,
                        message,
                    });
                }
            }
        }

        report
    }

    fn adopt_spawned(&mut self) {
        let spawned = std::mem::take(&mut *self.shared.spawned.lock());
        self.tasks.extend(spawned);
    }
}

impl<T> fmt::Debug for DeterministicScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeterministicScheduler")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

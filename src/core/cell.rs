//! # Per-task lifecycle cell.
//!
//! A [`TaskCell`] is what the pool stores for every admitted task: the
//! type-erased task, its [`TaskContext`], and the mutable status guarded by
//! the cell's own lock.
//!
//! ```text
//! new()  ─► running ──release(err)──► completed (frozen)
//!              │                         ├─ token cancelled
//!              │                         ├─ progress stream closed
//!              └─ cancel() ─► token      └─ waiters woken
//! ```
//!
//! `release` is the only transition from running to finished and happens
//! at most once.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::{mpsc, watch};

use crate::error::{PoolError, TaskError};
use crate::status::{TaskMetadata, TaskState, TaskStat};
use crate::sync::lock;
use crate::tasks::{Context, ErasedTask, Progress, TaskContext, TaskId, Targets};

struct CellState {
    modified_at: SystemTime,
    completed: bool,
    error: Option<TaskError>,
}

pub(crate) struct TaskCell {
    task: Arc<dyn ErasedTask>,
    ctx: TaskContext,
    targets: Targets,
    created_at: SystemTime,
    progress: Arc<Progress>,
    state: Mutex<CellState>,
    released: watch::Sender<bool>,
}

impl TaskCell {
    /// Assigns an id, derives the task context from `parent` and allocates
    /// the progress queue. The receiver end goes to the reporter.
    pub(crate) fn new(
        task: Arc<dyn ErasedTask>,
        parent: &Context,
        progress_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<u8>) {
        let id = TaskId::new();
        let (progress, rx) = Progress::channel(progress_capacity);
        let ctx = TaskContext::new(id, task.kind(), parent, Arc::clone(&progress));
        let targets = task.targets();
        let now = SystemTime::now();
        let (released, _) = watch::channel(false);

        let cell = Arc::new(Self {
            task,
            ctx,
            targets,
            created_at: now,
            progress,
            state: Mutex::new(CellState {
                modified_at: now,
                completed: false,
                error: None,
            }),
            released,
        });
        (cell, rx)
    }

    pub(crate) fn id(&self) -> TaskId {
        self.ctx.id()
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.ctx.kind()
    }

    pub(crate) fn targets(&self) -> &Targets {
        &self.targets
    }

    pub(crate) fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub(crate) fn task(&self) -> &dyn ErasedTask {
        self.task.as_ref()
    }

    pub(crate) fn ctx(&self) -> &TaskContext {
        &self.ctx
    }

    pub(crate) fn is_running(&self) -> bool {
        !lock(&self.state).completed
    }

    /// Freezes the final error and wakes waiters. Returns `false` if the
    /// cell was already released.
    pub(crate) fn release(&self, error: Option<TaskError>) -> bool {
        {
            let mut state = lock(&self.state);
            if state.completed {
                return false;
            }
            state.completed = true;
            state.error = error;
            state.modified_at = SystemTime::now();
        }
        self.ctx.token().cancel();
        self.progress.close();
        self.released.send_replace(true);
        true
    }

    /// Requests cancellation without waiting for the task to observe it.
    pub(crate) fn cancel(&self) -> Result<(), PoolError> {
        if !self.is_running() {
            return Err(PoolError::NotRunning(self.id()));
        }
        self.ctx.token().cancel();
        Ok(())
    }

    /// Waits for release and returns the final error.
    pub(crate) async fn wait(&self) -> Option<TaskError> {
        let mut rx = self.released.subscribe();
        let _ = rx.wait_for(|released| *released).await;
        self.err()
    }

    /// Final error; `None` while running or after success.
    pub(crate) fn err(&self) -> Option<TaskError> {
        lock(&self.state).error.clone()
    }

    pub(crate) fn stat(&self) -> TaskStat {
        let (state, description, modified_at) = {
            let s = lock(&self.state);
            let state = match (s.completed, &s.error) {
                (false, _) => TaskState::Running,
                (true, None) => TaskState::Completed,
                (true, Some(_)) => TaskState::Failed,
            };
            (state, s.error.as_ref().map(ToString::to_string), s.modified_at)
        };
        let modified_at = self.last_change(modified_at);

        TaskStat {
            id: self.id(),
            kind: self.kind().to_string(),
            state,
            description,
            progress: self.progress.get(),
            details: self.task.details(),
            created_at: self.created_at,
            modified_at,
        }
    }

    pub(crate) fn metadata(&self) -> TaskMetadata {
        TaskMetadata {
            id: self.id(),
            kind: self.kind().to_string(),
            targets: self.targets.clone(),
            tag: self.ctx.tag().map(str::to_string),
            created_at: self.created_at,
            modified_at: self.last_change(lock(&self.state).modified_at),
        }
    }

    /// Later of the recorded state change and the last progress change.
    fn last_change(&self, recorded: SystemTime) -> SystemTime {
        self.progress
            .changed_at()
            .map_or(recorded, |at| at.max(recorded))
    }
}

//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(TaskContext) -> Fut` so small tasks do not
//! need a dedicated type. Each start produces a fresh future owning its state;
//! share state explicitly through `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use taskpool::{OperationMode, Targets, Task, TaskContext, TaskError, TaskFn};
//!
//! let t = TaskFn::new("reconfigure", |ctx: TaskContext| async move {
//!     ctx.check()?;
//!     Ok::<_, TaskError>(())
//! })
//! .with_targets(Targets::new().with("vm1", OperationMode::BLOCK_CONF));
//!
//! assert_eq!(t.kind(), "reconfigure");
//! assert_eq!(t.targets().get("vm1"), Some(OperationMode::BLOCK_CONF));
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::{Targets, Task, TaskContext};

/// Function-backed task implementation.
#[derive(Debug)]
pub struct TaskFn<F> {
    kind: &'static str,
    targets: Targets,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a function-backed task with empty targets.
    pub fn new(kind: &'static str, f: F) -> Self {
        Self {
            kind,
            targets: Targets::new(),
            f,
        }
    }

    /// Sets the resources this task locks.
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = targets;
        self
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    type Response = ();

    fn kind(&self) -> &'static str {
        self.kind
    }

    fn targets(&self) -> Targets {
        self.targets.clone()
    }

    async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        (self.f)(ctx.clone()).await
    }
}

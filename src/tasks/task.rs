//! # Task contract.
//!
//! This module defines the [`Task`] trait implemented by every unit of work
//! the pool runs, plus the type-erased form the pool stores internally.
//!
//! ## Lifecycle
//! ```text
//! caller builds T ──► Pool::start_task(ctx, T, &mut resp, assignments)
//!                        ├─► classifiers assigned, conflict check, table insert
//!                        ├─► before_start(ctx, resp)      (synchronous to caller)
//!                        │      └─ Err ─► released, removed, unassigned
//!                        └─► spawn:
//!                              main(ctx)
//!                                ├─ Ok  ─► on_success(ctx)  (its Err becomes final)
//!                                └─ Err ─► on_failure(ctx, &err) (logged only)
//!                              release(final error) ─► eviction after grace window
//! ```

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::{TaskContext, Targets};

/// # Asynchronous, cancelable unit of orchestrated work.
///
/// A `Task` names its kind, declares the resources it touches via
/// [`targets`](Task::targets), and implements [`main`](Task::main). The other
/// hooks have no-op defaults.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use taskpool::{OperationMode, Targets, Task, TaskContext, TaskError};
///
/// struct Backup { vm: String, disk: String }
///
/// #[async_trait]
/// impl Task for Backup {
///     type Response = ();
///
///     fn kind(&self) -> &'static str { "backup" }
///
///     fn targets(&self) -> Targets {
///         Targets::new()
///             .with(self.vm.clone(), OperationMode::BLOCK_CONF)
///             .with(format!("{}:{}", self.vm, self.disk), OperationMode::BLOCK_ALL)
///     }
///
///     async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError> {
///         ctx.check()?;
///         ctx.set_progress(100);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Data returned to the synchronous caller by [`before_start`](Task::before_start)
    /// (for example allocated ports). Use `()` when there is none.
    type Response: Send;

    /// Stable type tag ("migration", "backup", ...), used in logs and conflict errors.
    fn kind(&self) -> &'static str;

    /// Resources this task locks while running. Empty targets never conflict.
    fn targets(&self) -> Targets {
        Targets::new()
    }

    /// Synchronous pre-flight check. A failure aborts the start before the task runs.
    async fn before_start(
        &self,
        _ctx: &TaskContext,
        _resp: &mut Self::Response,
    ) -> Result<(), TaskError> {
        Ok(())
    }

    /// Task body. Must honor cancellation and return promptly once cancelled.
    async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError>;

    /// Runs after `main` succeeded; an error here becomes the task's final error.
    async fn on_success(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
        Ok(())
    }

    /// Best-effort cleanup after `main` failed. Errors are logged, never surfaced.
    async fn on_failure(&self, _ctx: &TaskContext, _err: &TaskError) -> Result<(), TaskError> {
        Ok(())
    }

    /// Task-defined status payload included in every [`TaskStat`](crate::TaskStat).
    fn details(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Object-safe view of a [`Task`] with the response type erased.
#[async_trait]
pub(crate) trait ErasedTask: Send + Sync + 'static {
    fn kind(&self) -> &'static str;
    fn targets(&self) -> crate::tasks::Targets;
    async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError>;
    async fn on_success(&self, ctx: &TaskContext) -> Result<(), TaskError>;
    async fn on_failure(&self, ctx: &TaskContext, err: &TaskError) -> Result<(), TaskError>;
    fn details(&self) -> Option<serde_json::Value>;
}

/// Wrapper that implements [`ErasedTask`] for any [`Task`].
pub(crate) struct Erased<T>(pub(crate) T);

#[async_trait]
impl<T: Task> ErasedTask for Erased<T> {
    fn kind(&self) -> &'static str {
        self.0.kind()
    }

    fn targets(&self) -> Targets {
        self.0.targets()
    }

    async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        self.0.main(ctx).await
    }

    async fn on_success(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        self.0.on_success(ctx).await
    }

    async fn on_failure(&self, ctx: &TaskContext, err: &TaskError) -> Result<(), TaskError> {
        self.0.on_failure(ctx, err).await
    }

    fn details(&self) -> Option<serde_json::Value> {
        self.0.details()
    }
}

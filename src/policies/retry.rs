//! # Caller-side retry of conflicting starts.
//!
//! The pool never queues a task behind a conflicting one: `start_task`
//! fails with [`PoolError::Conflict`] and the caller decides what to do.
//! [`retry_start`] is the common answer: wait per [`BackoffPolicy`] and try
//! again, a bounded number of times, until the caller's context is cancelled.
//!
//! ```text
//! attempt 0 ─► start() ─ Conflict ─► sleep(next(0)) ─► attempt 1 ─► ...
//!                  │                     └─ ctx cancelled ─► Err(Canceled)
//!                  └─ Ok / other error ─► returned as is
//! ```

use std::future::Future;

use tokio::time;
use tracing::debug;

use crate::error::PoolError;
use crate::policies::BackoffPolicy;
use crate::tasks::{Context, TaskId};

/// Calls `start` until it stops failing with a target conflict.
///
/// `start` is invoked at most `max_attempts` times (min 1) and must build a
/// fresh task on every call. Errors other than [`PoolError::Conflict`] are
/// returned immediately; after the last attempt the conflict itself is
/// returned.
///
/// # Example
/// ```rust
/// use taskpool::{
///     BackoffPolicy, Context, OperationMode, Pool, PoolConfig, Targets, TaskContext,
///     TaskError, TaskFn, retry_start,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), taskpool::PoolError> {
/// let pool = Pool::new(PoolConfig::default());
/// let ctx = Context::new();
///
/// let id = retry_start(&ctx, &BackoffPolicy::default(), 5, || {
///     let task = TaskFn::new("netconf", |_ctx: TaskContext| async { Ok::<_, TaskError>(()) })
///         .with_targets(Targets::new().with("eth0", OperationMode::BLOCK_ALL));
///     let pool = pool.clone();
///     let ctx = ctx.clone();
///     async move { pool.start_task(&ctx, task, &mut (), vec![]).await }
/// })
/// .await?;
/// # let _ = id;
/// # Ok(())
/// # }
/// ```
pub async fn retry_start<F, Fut>(
    ctx: &Context,
    backoff: &BackoffPolicy,
    max_attempts: u32,
    mut start: F,
) -> Result<TaskId, PoolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TaskId, PoolError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        match start().await {
            Err(PoolError::Conflict(conflict)) if attempt + 1 < max_attempts => {
                let delay = backoff.next(attempt);
                debug!(
                    attempt,
                    holder = %conflict.id,
                    holder_kind = conflict.kind,
                    delay = ?delay,
                    "start conflicts with a running task, retrying"
                );
                tokio::select! {
                    _ = ctx.token().cancelled() => return Err(PoolError::Canceled),
                    _ = time::sleep(delay) => {}
                }
                attempt += 1;
            }
            res => return res,
        }
    }
}

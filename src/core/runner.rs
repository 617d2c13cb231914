//! # Run a task body and its completion hooks.
//!
//! Executes `main` followed by `on_success` or `on_failure` inside the task's
//! tracing span and returns the final error to be frozen by `release`.
//!
//! ## Flow
//!
//! ```text
//! Success:
//!   main() → Ok(()) → on_success() → Ok(())  → final = None
//!                                  → Err(e)  → final = Some(e)
//!
//! Failure / cancellation:
//!   main() → Err(e) → on_failure(&e) → Err(_) logged at warn
//!                                    → final = Some(e)
//!
//! Panic:
//!   main() panics → caught → final = Some(Fail{"main panicked: .."})
//!                          → on_failure runs as for any other error
//! ```
//!
//! ## Rules
//! - Exactly one of `on_success` / `on_failure` runs per task.
//! - `on_failure` never replaces the original error.
//! - A panicking hook never takes the driver task down with it.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{Instrument, debug, warn};

use crate::error::TaskError;
use crate::tasks::{ErasedTask, TaskContext};

/// Runs `task` to completion and returns its final error.
pub(crate) async fn run_task(task: &dyn ErasedTask, ctx: &TaskContext) -> Option<TaskError> {
    let span = ctx.span().clone();

    async move {
        debug!("task started");
        let res = match AssertUnwindSafe(task.main(ctx)).catch_unwind().await {
            Ok(res) => res,
            Err(panic_err) => Err(panicked("main", panic_err.as_ref())),
        };

        match res {
            Ok(()) => {
                let res = match AssertUnwindSafe(task.on_success(ctx)).catch_unwind().await {
                    Ok(res) => res,
                    Err(panic_err) => Err(panicked("on_success", panic_err.as_ref())),
                };
                match &res {
                    Ok(()) => debug!("task completed"),
                    Err(e) => warn!(error = %e, label = e.as_label(), "on_success failed"),
                }
                res.err()
            }
            Err(err) => {
                if err.is_canceled() {
                    debug!("task cancelled");
                } else {
                    warn!(error = %err, label = err.as_label(), "task failed");
                }
                match AssertUnwindSafe(task.on_failure(ctx, &err)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "on_failure cleanup failed"),
                    Err(panic_err) => {
                        warn!(error = %panicked("on_failure", panic_err.as_ref()), "on_failure cleanup failed")
                    }
                }
                Some(err)
            }
        }
    }
    .instrument(span)
    .await
}

fn panicked(hook: &str, any: &(dyn Any + Send)) -> TaskError {
    TaskError::fail(format!("{hook} panicked: {}", panic_message(any)))
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::tasks::{Context, Erased, Progress, Task, TaskId};

    #[derive(Default)]
    struct Hooks {
        fail_main: Option<TaskError>,
        fail_success: bool,
        panic_main: bool,
        successes: AtomicUsize,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl Task for Hooks {
        type Response = ();

        fn kind(&self) -> &'static str {
            "hooks"
        }

        async fn main(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
            if self.panic_main {
                panic!("boom");
            }
            match &self.fail_main {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn on_success(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
            self.successes.fetch_add(1, Ordering::SeqCst);
            if self.fail_success {
                return Err(TaskError::fail("commit failed"));
            }
            Ok(())
        }

        async fn on_failure(&self, _ctx: &TaskContext, _err: &TaskError) -> Result<(), TaskError> {
            self.failures.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::fail("cleanup failed"))
        }
    }

    async fn run(hooks: Hooks) -> (Option<TaskError>, Arc<Erased<Hooks>>) {
        let task = Arc::new(Erased(hooks));
        let (progress, _rx) = Progress::channel(1);
        let ctx = TaskContext::new(TaskId::new(), "hooks", &Context::new(), progress);
        let err = run_task(task.as_ref(), &ctx).await;
        (err, task)
    }

    #[tokio::test]
    async fn success_runs_on_success_only() {
        let (err, task) = run(Hooks::default()).await;
        assert_eq!(err, None);
        assert_eq!(task.0.successes.load(Ordering::SeqCst), 1);
        assert_eq!(task.0.failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn on_success_error_becomes_final() {
        let (err, _) = run(Hooks {
            fail_success: true,
            ..Default::default()
        })
        .await;
        assert_eq!(err, Some(TaskError::fail("commit failed")));
    }

    #[tokio::test]
    async fn on_failure_error_never_masks_original() {
        let (err, task) = run(Hooks {
            fail_main: Some(TaskError::Canceled),
            ..Default::default()
        })
        .await;
        assert_eq!(err, Some(TaskError::Canceled));
        assert_eq!(task.0.failures.load(Ordering::SeqCst), 1);
        assert_eq!(task.0.successes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panic_in_main_is_a_failure() {
        let (err, task) = run(Hooks {
            panic_main: true,
            ..Default::default()
        })
        .await;
        assert_eq!(err, Some(TaskError::fail("main panicked: boom")));
        assert_eq!(task.0.failures.load(Ordering::SeqCst), 1);
    }
}

//! # Pool: admission control and execution driver.
//!
//! The [`Pool`] owns the table of in-flight tasks, the [`ClassifierRegistry`]
//! and an optional [`Reporter`]. It admits tasks under the target conflict
//! rule, runs their pre-flight check synchronously and drives the rest of
//! their lifecycle in a spawned task.
//!
//! ## Admission
//! ```text
//! start_task(ctx, task, &mut resp, assignments)
//!   ├─► drain.enter()                       Err ─► Closed
//!   ├─► arm rollback (unassign, release + remove once inserted)
//!   ├─► registry.assign(a) for a in order   Err ─► unassign(id), Classifier
//!   ├─► ctx cancelled?                      yes ─► unassign(id), Canceled
//!   ├─► [table write lock]
//!   │     running tasks with targets: AND(mode) != 0 on a shared key?
//!   │                                       yes ─► unassign(id), Conflict
//!   │     insert
//!   ├─► before_start(ctx, resp)             Err ─► release, remove, unassign, Precondition
//!   ├─► reporter.send(initial stat)
//!   ├─► disarm rollback
//!   └─► spawn reporter.send_progress(stream), spawn driver ─► Ok(id)
//!
//! driver:
//!   run_task() ─► release(final) ─► registry.unassign(id) ─► reporter.send(final stat)
//!             ─► drop in-flight guard ─► sleep(eviction_delay) ─► evict if still released
//! ```
//!
//! ## Rules
//! - The conflict check and the insert happen under one write lock, so two
//!   admissions can never both pass the check against each other.
//! - `before_start` runs outside the table lock.
//! - Dropping a `start_task` future mid-admission rolls back like an error:
//!   nothing stays assigned or inserted for a task that never started.
//! - Queries never change admission state.
//! - [`Pool::wait_and_close`] cancels nothing; cancel tasks first for a
//!   bounded shutdown.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info};

use crate::classifiers::{Assignment, ClassifierRegistry};
use crate::core::builder::PoolBuilder;
use crate::core::cell::TaskCell;
use crate::core::config::PoolConfig;
use crate::core::drain::{Drain, InflightGuard};
use crate::core::runner::run_task;
use crate::error::{ConcurrentRunningError, PoolError, TaskError};
use crate::status::{Reporter, TaskMetadata, TaskStat};
use crate::sync::{read, write};
use crate::tasks::{Context, Erased, Task, TaskId};

pub(crate) struct PoolInner {
    cfg: PoolConfig,
    tasks: RwLock<HashMap<TaskId, Arc<TaskCell>>>,
    registry: Arc<ClassifierRegistry>,
    reporter: Option<Arc<dyn Reporter>>,
    drain: Arc<Drain>,
}

/// Resource-aware task pool.
///
/// Cheap to clone; clones share the same table, registry and reporter.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use taskpool::{
///     Assignment, ClassifierRegistry, Context, OperationMode, Pool, PoolConfig, Targets,
///     TaskContext, TaskError, TaskFn, UniqueLabel,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(ClassifierRegistry::new());
/// registry.register(&["unique"], Arc::new(UniqueLabel::new()))?;
///
/// let pool = Pool::builder(PoolConfig::default())
///     .with_registry(registry)
///     .build();
///
/// let migrate = TaskFn::new("migration", |ctx: TaskContext| async move {
///     ctx.set_progress(100);
///     Ok::<_, TaskError>(())
/// })
/// .with_targets(Targets::new().with("vm1", OperationMode::BLOCK_ALL));
///
/// let id = pool
///     .start_task(
///         &Context::new(),
///         migrate,
///         &mut (),
///         vec![Assignment::label("unique", "vm1/migration")],
///     )
///     .await?;
///
/// assert_eq!(pool.wait(id).await?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Creates a pool with an empty classifier registry and no reporter.
    pub fn new(cfg: PoolConfig) -> Self {
        Self::builder(cfg).build()
    }

    pub fn builder(cfg: PoolConfig) -> PoolBuilder {
        PoolBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: PoolConfig,
        registry: Arc<ClassifierRegistry>,
        reporter: Option<Arc<dyn Reporter>>,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                cfg,
                tasks: RwLock::new(HashMap::new()),
                registry,
                reporter,
                drain: Drain::new(),
            }),
        }
    }

    /// Admits `task` and starts it in the background.
    ///
    /// Returns once `before_start` has finished; `resp` is the out-parameter
    /// `before_start` fills for the caller. Cancelling `ctx` cancels the task.
    ///
    /// # Errors
    /// - [`PoolError::Closed`] after [`wait_and_close`](Self::wait_and_close)
    /// - [`PoolError::Classifier`] if an assignment fails (earlier ones are rolled back)
    /// - [`PoolError::Canceled`] if `ctx` was cancelled during admission
    /// - [`PoolError::Conflict`] if a running task holds a conflicting target
    /// - [`PoolError::Precondition`] if `before_start` failed
    pub async fn start_task<T: Task>(
        &self,
        ctx: &Context,
        task: T,
        resp: &mut T::Response,
        assignments: Vec<Assignment>,
    ) -> Result<TaskId, PoolError> {
        let guard = self.inner.drain.enter()?;
        let inner = &self.inner;

        let task = Arc::new(Erased(task));
        let (cell, progress_rx) =
            TaskCell::new(task.clone(), ctx, inner.cfg.progress_capacity_clamped());
        let id = cell.id();
        let span = cell.ctx().span().clone();
        let mut rollback = Rollback::new(inner, id, span.clone());

        for assignment in &assignments {
            if let Err(e) = inner.registry.assign(ctx.token(), id, assignment).await {
                debug!(parent: &span, classifier = assignment.name(), error = %e, "assignment rejected");
                return Err(e.into());
            }
        }

        if ctx.is_cancelled() {
            debug!(parent: &span, "start cancelled by caller");
            return Err(PoolError::Canceled);
        }

        if let Err(e) = inner.admit(&cell) {
            debug!(parent: &span, error = %e, "admission rejected");
            return Err(e);
        }
        rollback.admitted(Arc::clone(&cell));

        if let Err(e) = task.0.before_start(cell.ctx(), resp).instrument(span.clone()).await {
            cell.release(Some(e.clone()));
            debug!(parent: &span, error = %e, "before_start rejected task");
            return Err(PoolError::Precondition(e));
        }

        if let Some(reporter) = &inner.reporter {
            reporter.send(ctx.token(), &cell.stat()).await;
        }

        rollback.disarm();
        if let Some(reporter) = &inner.reporter {
            let reporter = Arc::clone(reporter);
            let token = ctx.token().clone();
            tokio::spawn(async move { reporter.send_progress(&token, id, progress_rx).await });
        }

        info!(parent: &span, targets = %cell.targets(), "task admitted");
        tokio::spawn(drive(
            Arc::clone(inner),
            cell,
            ctx.token().clone(),
            guard,
        ));
        Ok(id)
    }

    /// Requests cancellation of a running task and returns immediately.
    pub fn cancel(&self, id: TaskId) -> Result<(), PoolError> {
        self.inner.cell(id)?.cancel()
    }

    /// Waits until the task has released and returns its final error.
    pub async fn wait(&self, id: TaskId) -> Result<Option<TaskError>, PoolError> {
        let cell = self.inner.cell(id)?;
        Ok(cell.wait().await)
    }

    /// Final error; `None` while running or after success.
    pub fn err(&self, id: TaskId) -> Result<Option<TaskError>, PoolError> {
        Ok(self.inner.cell(id)?.err())
    }

    pub fn stat(&self, id: TaskId) -> Result<TaskStat, PoolError> {
        Ok(self.inner.cell(id)?.stat())
    }

    pub fn metadata(&self, id: TaskId) -> Result<TaskMetadata, PoolError> {
        Ok(self.inner.cell(id)?.metadata())
    }

    /// Snapshots of every task in the table, oldest first.
    pub fn list(&self) -> Vec<TaskStat> {
        self.inner.sorted_cells().iter().map(|c| c.stat()).collect()
    }

    /// Snapshots of the tasks classifier `name` holds under any of `labels`.
    ///
    /// Ids whose tasks were already evicted are skipped.
    pub fn stat_by_label(&self, name: &str, labels: &[&str]) -> Result<Vec<TaskStat>, PoolError> {
        Ok(self
            .inner
            .cells_by_label(name, labels)?
            .iter()
            .map(|c| c.stat())
            .collect())
    }

    pub fn metadata_by_label(
        &self,
        name: &str,
        labels: &[&str],
    ) -> Result<Vec<TaskMetadata>, PoolError> {
        Ok(self
            .inner
            .cells_by_label(name, labels)?
            .iter()
            .map(|c| c.metadata())
            .collect())
    }

    /// Cancels every task classifier `name` holds under any of `labels`.
    ///
    /// Returns one result per matched task; tasks that already released
    /// report [`PoolError::NotRunning`].
    pub fn cancel_by_label(
        &self,
        name: &str,
        labels: &[&str],
    ) -> Result<Vec<(TaskId, Result<(), PoolError>)>, PoolError> {
        let ids = self.inner.registry.get(name, labels)?;
        Ok(ids.into_iter().map(|id| (id, self.cancel(id))).collect())
    }

    /// Waits until no `start_task` call is in flight, then rejects new ones.
    ///
    /// A call is in flight from its admission until its task released and the
    /// final status was reported.
    pub async fn wait_and_close(&self) {
        self.inner.drain.wait_and_close().await;
        info!(tasks = self.len(), "pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.drain.is_closed()
    }

    /// Number of tasks in the table (running or within their eviction window).
    pub fn len(&self) -> usize {
        read(&self.inner.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `start_task` calls that have not finished yet.
    pub fn inflight(&self) -> usize {
        self.inner.drain.inflight()
    }

    pub fn registry(&self) -> &Arc<ClassifierRegistry> {
        &self.inner.registry
    }
}

impl PoolInner {
    /// Conflict check plus insert, atomically.
    fn admit(&self, cell: &Arc<TaskCell>) -> Result<(), PoolError> {
        let mut tasks = write(&self.tasks);
        let targets = cell.targets();
        if !targets.is_empty() {
            for other in tasks.values() {
                if other.targets().is_empty() || !other.is_running() {
                    continue;
                }
                if let Some(key) = targets.conflicts_with(other.targets()) {
                    debug!(task = %cell.id(), holder = %other.id(), key, "target conflict");
                    return Err(ConcurrentRunningError {
                        id: other.id(),
                        kind: other.kind(),
                        targets: other.targets().clone(),
                    }
                    .into());
                }
            }
        }
        tasks.insert(cell.id(), Arc::clone(cell));
        Ok(())
    }

    fn cell(&self, id: TaskId) -> Result<Arc<TaskCell>, PoolError> {
        read(&self.tasks)
            .get(&id)
            .cloned()
            .ok_or(PoolError::NotFound(id))
    }

    fn sorted_cells(&self) -> Vec<Arc<TaskCell>> {
        let mut cells: Vec<_> = read(&self.tasks).values().cloned().collect();
        cells.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        cells
    }

    fn cells_by_label(&self, name: &str, labels: &[&str]) -> Result<Vec<Arc<TaskCell>>, PoolError> {
        let ids = self.registry.get(name, labels)?;
        let tasks = read(&self.tasks);
        Ok(ids.iter().filter_map(|id| tasks.get(id).cloned()).collect())
    }

    fn remove(&self, id: TaskId) {
        write(&self.tasks).remove(&id);
    }

    /// Removes a released task; a running one stays.
    fn evict(&self, id: TaskId) {
        let mut tasks = write(&self.tasks);
        if tasks.get(&id).is_some_and(|c| !c.is_running()) {
            tasks.remove(&id);
            debug!(task = %id, "task evicted");
        }
    }
}

/// Undoes a partial admission unless disarmed.
///
/// Covers both early `Err` returns and a `start_task` future dropped while
/// suspended (classifier wait, `before_start`, initial report): labels are
/// unassigned and an inserted cell is released and removed.
struct Rollback<'a> {
    inner: &'a PoolInner,
    id: TaskId,
    span: Span,
    admitted: Option<Arc<TaskCell>>,
    armed: bool,
}

impl<'a> Rollback<'a> {
    fn new(inner: &'a PoolInner, id: TaskId, span: Span) -> Self {
        Self {
            inner,
            id,
            span,
            admitted: None,
            armed: true,
        }
    }

    fn admitted(&mut self, cell: Arc<TaskCell>) {
        self.admitted = Some(cell);
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(cell) = self.admitted.take() {
            if cell.release(Some(TaskError::Canceled)) {
                debug!(parent: &self.span, "admission abandoned by caller");
            }
            self.inner.remove(self.id);
        }
        self.inner.registry.unassign(self.id);
    }
}

/// Runs the admitted task to completion and schedules its eviction.
async fn drive(
    inner: Arc<PoolInner>,
    cell: Arc<TaskCell>,
    caller: CancellationToken,
    guard: InflightGuard,
) {
    let id = cell.id();
    let err = run_task(cell.task(), cell.ctx()).await;
    cell.release(err);
    inner.registry.unassign(id);

    if let Some(reporter) = &inner.reporter {
        reporter.send(&caller, &cell.stat()).await;
    }
    drop(guard);

    let window = inner.cfg.eviction_window();
    let pool: Weak<PoolInner> = Arc::downgrade(&inner);
    drop(inner);
    drop(cell);

    if let Some(delay) = window {
        time::sleep(delay).await;
    }
    if let Some(inner) = pool.upgrade() {
        inner.evict(id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::tasks::{OperationMode, TaskContext, Targets};

    fn pool() -> Pool {
        Pool::new(PoolConfig {
            eviction_delay: Duration::from_secs(60),
            ..PoolConfig::default()
        })
    }

    struct Blocker(Targets);

    #[async_trait]
    impl Task for Blocker {
        type Response = ();

        fn kind(&self) -> &'static str {
            "blocker"
        }

        fn targets(&self) -> Targets {
            self.0.clone()
        }

        async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError> {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        }
    }

    fn blocker(targets: Targets) -> Blocker {
        Blocker(targets)
    }

    #[tokio::test]
    async fn empty_targets_never_conflict() {
        let pool = pool();
        let ctx = Context::new();
        pool.start_task(&ctx, blocker(Targets::new()), &mut (), vec![])
            .await
            .unwrap();
        pool.start_task(&ctx, blocker(Targets::new()), &mut (), vec![])
            .await
            .unwrap();
        assert_eq!(pool.len(), 2);
        ctx.cancel();
    }

    #[tokio::test]
    async fn conflict_is_rejected_without_mutation() {
        let pool = pool();
        let ctx = Context::new();
        let a = pool
            .start_task(
                &ctx,
                blocker(Targets::new().with("vm1", OperationMode::BLOCK_BACKUP)),
                &mut (),
                vec![],
            )
            .await
            .unwrap();

        let err = pool
            .start_task(
                &ctx,
                blocker(Targets::new().with("vm1", OperationMode::BLOCK_ALL)),
                &mut (),
                vec![],
            )
            .await
            .unwrap_err();
        assert_eq!(err.as_conflict().map(|c| c.id), Some(a));
        assert_eq!(pool.len(), 1);
        ctx.cancel();
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let pool = pool();
        let id = TaskId::new();
        assert_eq!(pool.stat(id).unwrap_err(), PoolError::NotFound(id));
        assert_eq!(pool.cancel(id).unwrap_err(), PoolError::NotFound(id));
        assert!(pool.list().is_empty());
    }

    #[tokio::test]
    async fn missing_classifier_rolls_back() {
        let pool = pool();
        let err = pool
            .start_task(
                &Context::new(),
                blocker(Targets::new()),
                &mut (),
                vec![Assignment::label("unique", "vm1")],
            )
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "classifier_not_found");
        assert!(pool.is_empty());
        assert_eq!(pool.inflight(), 0);
    }
}

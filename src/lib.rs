//! # taskpool
//!
//! **Taskpool** is a resource-aware task pool for host orchestration daemons.
//!
//! It runs asynchronous, cancelable units of work ("tasks") under a mutual
//! exclusion rule derived from the resources each task declares, and lets
//! applications group, deduplicate and rate-limit tasks by label through
//! pluggable classifiers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  migration   │   │    backup    │   │   netconf    │
//!     │ vm1=BlockAll │   │ vm1=BlockConf│   │  (no targets)│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Pool::start_task(ctx, task, &mut resp, assignments)              │
//! │  - Drain (in-flight counter, closed flag)                         │
//! │  - ClassifierRegistry ─► UniqueLabel / GroupLabel / LimitedGroup  │
//! │  - task table (conflict check + insert under one write lock)      │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │   driver     │   │   driver     │   │   driver     │   │
//!     │ main + hooks │   │ main + hooks │   │ main + hooks │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ release          │ release          │ release         │ initial stat
//!      │ unassign         │ unassign         │ unassign        │ progress stream
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Reporter (optional sink)                      │
//! │      ReporterSet ─► FileReporter / LogReporter / your own         │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Task ──► start_task ──► before_start (caller waits) ──► Ok(id)
//!                              │
//!                              └─► spawned driver:
//!                                    main()
//!                                      ├─ Ok  ─► on_success()
//!                                      └─ Err ─► on_failure()  (logged only)
//!                                    release(final error)      Running ─► Completed | Failed
//!                                    registry.unassign(id)
//!                                    eviction after PoolConfig::eviction_delay
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types / traits                                     |
//! |-----------------|--------------------------------------------------------------|--------------------------------------------------------|
//! | **Tasks**       | Define tasks as types or closures, declare their targets.    | [`Task`], [`TaskFn`], [`Targets`], [`OperationMode`]   |
//! | **Pool**        | Admission, queries, cancellation, graceful drain.            | [`Pool`], [`PoolBuilder`], [`PoolConfig`]              |
//! | **Classifiers** | Deduplicate, group and rate-limit tasks by label.            | [`Classifier`], [`ClassifierRegistry`], [`Assignment`] |
//! | **Status**      | Snapshots, progress streams and reporters.                   | [`TaskStat`], [`Reporter`], [`ReporterSet`]            |
//! | **Policies**    | Caller-side retry of conflicting starts.                     | [`retry_start`], [`BackoffPolicy`]                     |
//! | **Errors**      | Typed errors for admission, classifiers and task execution.  | [`PoolError`], [`ClassifierError`], [`TaskError`]      |
//!
//! ## Optional features
//! - `logging`: exports a tracing-backed `LogReporter` _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskpool::{
//!     Assignment, ClassifierRegistry, Context, LimitedGroup, LimitedGroupConfig,
//!     OperationMode, Pool, PoolConfig, Targets, TaskContext, TaskError, TaskFn, UniqueLabel,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ClassifierRegistry::new());
//!     registry.register(&["unique"], Arc::new(UniqueLabel::new()))?;
//!     registry.register(
//!         &["host-network"],
//!         Arc::new(LimitedGroup::new(LimitedGroupConfig::new(
//!             "host-network",
//!             2,
//!             Duration::from_secs(3600),
//!         ))),
//!     )?;
//!
//!     let pool = Pool::builder(PoolConfig::default())
//!         .with_registry(registry)
//!         .build();
//!
//!     let netconf = TaskFn::new("netconf", |ctx: TaskContext| async move {
//!         ctx.check()?;
//!         ctx.set_progress(100);
//!         Ok::<_, TaskError>(())
//!     })
//!     .with_targets(Targets::new().with("eth0", OperationMode::BLOCK_ALL));
//!
//!     let id = pool
//!         .start_task(
//!             &Context::new().with_tag("req-42"),
//!             netconf,
//!             &mut (),
//!             vec![
//!                 Assignment::label("host-network", "host-network"),
//!                 Assignment::label("unique", "eth0"),
//!             ],
//!         )
//!         .await?;
//!
//!     assert_eq!(pool.wait(id).await?, None);
//!     pool.wait_and_close().await;
//!     Ok(())
//! }
//! ```
mod classifiers;
mod core;
mod error;
mod policies;
mod status;
mod sync;
mod tasks;

// ---- Public re-exports ----

pub use classifiers::{
    Assignment, Classifier, ClassifierOptions, ClassifierRegistry, GroupLabel, LabelOptions,
    LimitedGroup, LimitedGroupConfig, UniqueLabel, normalize_label,
};
pub use core::{Pool, PoolBuilder, PoolConfig};
pub use error::{ClassifierError, ConcurrentRunningError, PoolError, TaskError};
pub use policies::{BackoffPolicy, JitterPolicy, retry_start};
pub use status::{
    FileReporter, Reporter, ReporterSet, StatFileError, TaskMetadata, TaskStat, TaskState,
    load_stat, persist_stat,
};
pub use tasks::{Context, OperationMode, Targets, Task, TaskContext, TaskFn, TaskId};

// Optional: expose a tracing-backed reporter (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use status::LogReporter;

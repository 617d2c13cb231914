//! # Example: vm_ops
//!
//! A small host daemon session: a live migration locks `vm1`, a backup of
//! the same VM conflicts with it and retries with backoff, and three network
//! reconfigurations share a limited group of two slots.
//!
//! ## Flow
//! ```text
//! migration vm1=BlockAll ──► before_start allocates port ──► running 600ms
//! backup    vm1=BlockConf ─► Conflict ─► retry_start backoff ─► admitted after migration
//! netconf × 3 ──► host-network (capacity 2) ──► third waits for a free slot
//! wait_and_close ──► all drivers finished, statuses persisted under a temp dir
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example vm_ops --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use taskpool::{
    Assignment, BackoffPolicy, ClassifierRegistry, Context, FileReporter, GroupLabel,
    LimitedGroup, LimitedGroupConfig, LogReporter, OperationMode, Pool, PoolConfig, Targets,
    Task, TaskContext, TaskError, TaskFn, UniqueLabel, retry_start,
};

static NEXT_PORT: AtomicU16 = AtomicU16::new(49152);

struct Migration {
    vm: String,
    dest: String,
}

#[async_trait]
impl Task for Migration {
    type Response = u16;

    fn kind(&self) -> &'static str {
        "migration"
    }

    fn targets(&self) -> Targets {
        Targets::new().with(self.vm.clone(), OperationMode::BLOCK_ALL)
    }

    async fn before_start(&self, _ctx: &TaskContext, port: &mut u16) -> Result<(), TaskError> {
        if self.dest.is_empty() {
            return Err(TaskError::precondition("destination host is required"));
        }
        *port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        for step in 1..=6u8 {
            tokio::select! {
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
            ctx.set_progress(step * 100 / 6);
        }
        println!("[migration] {} moved to {}", self.vm, self.dest);
        Ok(())
    }

    async fn on_failure(&self, _ctx: &TaskContext, err: &TaskError) -> Result<(), TaskError> {
        println!("[migration] rolling back {} after: {err}", self.vm);
        Ok(())
    }

    fn details(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "vm": self.vm, "dest": self.dest }))
    }
}

struct Backup {
    vm: &'static str,
}

#[async_trait]
impl Task for Backup {
    type Response = ();

    fn kind(&self) -> &'static str {
        "backup"
    }

    fn targets(&self) -> Targets {
        Targets::new().with(self.vm, OperationMode::BLOCK_CONF)
    }

    async fn main(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        ctx.check()?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        ctx.set_progress(100);
        println!("[backup] {} snapshot stored", self.vm);
        Ok(())
    }
}

fn registry() -> anyhow::Result<Arc<ClassifierRegistry>> {
    let registry = Arc::new(ClassifierRegistry::new());
    registry.register(&["unique", "uniq"], Arc::new(UniqueLabel::new()))?;
    registry.register(&["group"], Arc::new(GroupLabel::new()))?;
    registry.register(
        &["host-network"],
        Arc::new(LimitedGroup::new(LimitedGroupConfig::new(
            "host-network",
            2,
            Duration::from_secs(10),
        ))),
    )?;
    Ok(registry)
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let status_dir = tempfile::tempdir()?;
    let pool = Pool::builder(PoolConfig {
        eviction_delay: Duration::from_secs(2),
        ..PoolConfig::default()
    })
    .with_registry(registry()?)
    .with_reporter(Arc::new(LogReporter::new()))
    .with_reporter(Arc::new(FileReporter::new(status_dir.path())))
    .build();

    let ctx = Context::new().with_tag("session-1");

    // 1. Migration locks vm1 entirely.
    let mut port = 0;
    let migration = pool
        .start_task(
            &ctx,
            Migration {
                vm: "vm1".into(),
                dest: "host-b".into(),
            },
            &mut port,
            vec![
                Assignment::label("unique", "vm1/migration"),
                Assignment::label("group", "vm1/long-running"),
            ],
        )
        .await?;
    println!("[main] migration {migration} listening on port {port}");

    // 2. Backup conflicts until the migration releases vm1.
    let backoff = BackoffPolicy {
        first: Duration::from_millis(100),
        max: Duration::from_millis(400),
        ..BackoffPolicy::default()
    };
    let backup_id = retry_start(&ctx, &backoff, 20, || {
        let pool = pool.clone();
        let ctx = ctx.clone();
        async move { pool.start_task(&ctx, Backup { vm: "vm1" }, &mut (), vec![]).await }
    })
    .await?;
    println!("[main] backup {backup_id} admitted after the migration");

    // 3. Three network reconfigurations, at most two at a time.
    let mut netconfs = Vec::new();
    for nic in ["eth0", "eth1", "eth2"] {
        let pool = pool.clone();
        let ctx = ctx.clone();
        let nic = nic.to_string();
        netconfs.push(tokio::spawn(async move {
            let targets = Targets::new().with(nic.clone(), OperationMode::BLOCK_ALL);
            let task = TaskFn::new("netconf", move |ctx: TaskContext| {
                let nic = nic.clone();
                async move {
                    ctx.check()?;
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    println!("[netconf] {nic} reconfigured");
                    Ok::<_, TaskError>(())
                }
            })
            .with_targets(targets);
            pool.start_task(
                &ctx,
                task,
                &mut (),
                vec![Assignment::label("host-network", "host-network")],
            )
            .await
        }));
    }
    for handle in netconfs {
        let id = handle.await??;
        println!("[main] netconf {id} admitted");
    }

    for stat in pool.list() {
        println!(
            "[main] {} {:<9} {:?} {}%",
            stat.id, stat.kind, stat.state, stat.progress
        );
    }

    // 4. Drain: every admitted task finishes and reports before close.
    pool.wait_and_close().await;

    // Reporter queues drain asynchronously.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let persisted = FileReporter::new(status_dir.path()).load(migration).await?;
    println!(
        "[main] persisted migration status: {:?} ({}%)",
        persisted.state, persisted.progress
    );
    Ok(())
}

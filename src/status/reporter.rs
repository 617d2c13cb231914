//! # Reporter contract.
//!
//! A [`Reporter`] is the pool's telemetry sink, implemented by the hosting
//! service to persist or forward task status.
//!
//! ```text
//! start_task ─► send(initial stat)                 (awaited by the caller)
//!           └─► spawn send_progress(id, stream)    (lives until release)
//! release    ─► send(final stat)                   (awaited by the driver task)
//! ```
//!
//! ## Rules
//! - `send` is awaited on the admission path, keep it short.
//! - `send_progress` runs in its own spawned task; a slow implementation
//!   only loses progress updates (the stream is bounded and drop-on-full),
//!   it never stalls the task body.
//! - The stream closes when the task releases.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::status::TaskStat;
use crate::tasks::TaskId;

/// Sink for task status snapshots and progress streams.
#[async_trait]
pub trait Reporter: Send + Sync + 'static {
    /// Receives a status snapshot after the task's state changed.
    ///
    /// `ctx` is the token of the caller that started the task.
    async fn send(&self, ctx: &CancellationToken, stat: &TaskStat);

    /// Consumes the task's progress updates until the stream closes.
    ///
    /// The default implementation discards every update.
    async fn send_progress(
        &self,
        _ctx: &CancellationToken,
        _id: TaskId,
        mut progress: mpsc::Receiver<u8>,
    ) {
        while progress.recv().await.is_some() {}
    }

    /// Stable reporter tag used in logs.
    fn name(&self) -> &'static str;
}

//! # LogReporter: tracing-backed status printer
//!
//! A minimal reporter that writes every snapshot and progress update as a
//! structured `tracing` event. Use it for demos or debugging.
//!
//! ## Example output
//! ```text
//! INFO task status task=6f1c.. kind="backup" state=Running progress=0
//! DEBUG task progress task=6f1c.. progress=40
//! WARN task status task=6f1c.. kind="backup" state=Failed progress=40 description="context cancelled"
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::status::{Reporter, TaskState, TaskStat};
use crate::tasks::TaskId;

/// Reporter that logs through `tracing`.
#[derive(Default)]
pub struct LogReporter;

impl LogReporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reporter for LogReporter {
    async fn send(&self, _ctx: &CancellationToken, stat: &TaskStat) {
        match stat.state {
            TaskState::Failed => warn!(
                task = %stat.id,
                kind = %stat.kind,
                state = ?stat.state,
                progress = stat.progress,
                description = stat.description.as_deref().unwrap_or(""),
                "task status"
            ),
            _ => info!(
                task = %stat.id,
                kind = %stat.kind,
                state = ?stat.state,
                progress = stat.progress,
                "task status"
            ),
        }
    }

    async fn send_progress(
        &self,
        _ctx: &CancellationToken,
        id: TaskId,
        mut progress: mpsc::Receiver<u8>,
    ) {
        while let Some(pct) = progress.recv().await {
            debug!(task = %id, progress = pct, "task progress");
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

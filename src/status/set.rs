//! # Non-blocking fan-out to multiple reporters.
//!
//! [`ReporterSet`] is itself a [`Reporter`], so a pool configured with it
//! feeds any number of sinks without knowing about them.
//!
//! ## Architecture
//! ```text
//! send(stat)
//!     ├──► [queue 1] ──► worker 1 ──► reporter1.send()
//!     │    (bounded)         └──────► panic → logged, worker continues
//!     └──► [queue N] ──► worker N ──► reporterN.send()
//!
//! send_progress(id, stream)
//!     stream ──► forwarder ──┬──► [stream 1] ──► reporter1.send_progress()
//!                            └──► [stream N] ──► reporterN.send_progress()
//! ```
//!
//! ## Rules
//! - `send()` returns immediately (uses `try_send`); a full queue drops the
//!   snapshot for that reporter only.
//! - Per-reporter FIFO, no cross-reporter ordering.
//! - A panicking reporter is isolated with `catch_unwind` and logged.
//!
//! `AssertUnwindSafe` is used, so a reporter that panics while holding its
//! own lock may leave that state poisoned.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::core::panic_message;
use crate::status::{Reporter, TaskStat};
use crate::tasks::TaskId;

/// Default per-reporter snapshot queue capacity.
const QUEUE_CAPACITY: usize = 256;

type Snapshot = (CancellationToken, Arc<TaskStat>);

struct ReporterChannel {
    reporter: Arc<dyn Reporter>,
    sender: mpsc::Sender<Snapshot>,
}

/// Fan-out coordinator over several reporters.
///
/// Must be created inside a tokio runtime: one worker task is spawned per
/// reporter.
pub struct ReporterSet {
    channels: Vec<ReporterChannel>,
    workers: Vec<JoinHandle<()>>,
    progress_capacity: usize,
}

impl ReporterSet {
    #[must_use]
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self::with_capacity(reporters, QUEUE_CAPACITY)
    }

    /// Creates a set whose per-reporter queues hold up to `capacity` items (min 1).
    #[must_use]
    pub fn with_capacity(reporters: Vec<Arc<dyn Reporter>>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut channels = Vec::with_capacity(reporters.len());
        let mut workers = Vec::with_capacity(reporters.len());

        for reporter in reporters {
            let (tx, mut rx) = mpsc::channel::<Snapshot>(capacity);
            let r = Arc::clone(&reporter);

            let handle = tokio::spawn(async move {
                while let Some((ctx, stat)) = rx.recv().await {
                    let fut = r.send(&ctx, stat.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                    {
                        error!(
                            reporter = r.name(),
                            task = %stat.id,
                            info = %panic_message(panic_err.as_ref()),
                            "reporter panicked"
                        );
                    }
                }
            });
            channels.push(ReporterChannel {
                reporter,
                sender: tx,
            });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            progress_capacity: capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Closes every queue and waits for the workers to deliver what is queued.
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[async_trait]
impl Reporter for ReporterSet {
    async fn send(&self, ctx: &CancellationToken, stat: &TaskStat) {
        let stat = Arc::new(stat.clone());
        for channel in &self.channels {
            match channel
                .sender
                .try_send((ctx.clone(), Arc::clone(&stat)))
            {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(reporter = channel.reporter.name(), task = %stat.id, "reporter queue full, snapshot dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(reporter = channel.reporter.name(), task = %stat.id, "reporter worker gone, snapshot dropped");
                }
            }
        }
    }

    async fn send_progress(
        &self,
        ctx: &CancellationToken,
        id: TaskId,
        mut progress: mpsc::Receiver<u8>,
    ) {
        let mut senders = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let (tx, rx) = mpsc::channel::<u8>(self.progress_capacity);
            let reporter = Arc::clone(&channel.reporter);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let fut = reporter.send_progress(&ctx, id, rx);
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    error!(
                        reporter = reporter.name(),
                        task = %id,
                        info = %panic_message(panic_err.as_ref()),
                        "reporter panicked while streaming progress"
                    );
                }
            });
            senders.push(tx);
        }

        while let Some(pct) = progress.recv().await {
            for tx in &senders {
                let _ = tx.try_send(pct);
            }
        }
        drop(senders);
    }

    fn name(&self) -> &'static str {
        "reporter-set"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::status::TaskState;

    #[derive(Default)]
    struct Recorder {
        stats: Mutex<Vec<TaskState>>,
        progress: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl Reporter for Recorder {
        async fn send(&self, _ctx: &CancellationToken, stat: &TaskStat) {
            self.stats.lock().unwrap().push(stat.state);
        }

        async fn send_progress(
            &self,
            _ctx: &CancellationToken,
            _id: TaskId,
            mut progress: mpsc::Receiver<u8>,
        ) {
            while let Some(p) = progress.recv().await {
                self.progress.lock().unwrap().push(p);
            }
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicky;

    #[async_trait]
    impl Reporter for Panicky {
        async fn send(&self, _ctx: &CancellationToken, _stat: &TaskStat) {
            panic!("sink exploded");
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    fn stat(state: TaskState) -> TaskStat {
        TaskStat {
            id: TaskId::new(),
            kind: "demo".into(),
            state,
            description: None,
            progress: 0,
            details: None,
            created_at: SystemTime::now(),
            modified_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn panicking_reporter_does_not_affect_others() {
        let rec = Arc::new(Recorder::default());
        let reporters: Vec<Arc<dyn Reporter>> = vec![Arc::new(Panicky), rec.clone()];
        let set = ReporterSet::new(reporters);
        let ctx = CancellationToken::new();

        set.send(&ctx, &stat(TaskState::Running)).await;
        set.send(&ctx, &stat(TaskState::Completed)).await;
        set.shutdown().await;

        assert_eq!(
            *rec.stats.lock().unwrap(),
            vec![TaskState::Running, TaskState::Completed]
        );
    }

    #[tokio::test]
    async fn progress_is_forwarded_to_every_reporter() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let reporters: Vec<Arc<dyn Reporter>> = vec![a.clone(), b.clone()];
        let set = ReporterSet::new(reporters);

        let (tx, rx) = mpsc::channel(8);
        for p in [10, 50, 100] {
            tx.send(p).await.unwrap();
        }
        drop(tx);
        set.send_progress(&CancellationToken::new(), TaskId::new(), rx)
            .await;

        tokio::time::timeout(Duration::from_secs(1), async {
            while a.progress.lock().unwrap().len() < 3 || b.progress.lock().unwrap().len() < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*a.progress.lock().unwrap(), vec![10, 50, 100]);
        assert_eq!(*b.progress.lock().unwrap(), vec![10, 50, 100]);
    }
}

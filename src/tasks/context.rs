//! # Caller and task contexts.
//!
//! - [`Context`] is what a caller hands to [`Pool::start_task`](crate::Pool::start_task):
//!   a cancellation token plus an optional correlation tag.
//! - [`TaskContext`] is what the pool hands to every task hook: the task's own
//!   child token, its identity, a progress sink and a tracing span.
//!
//! ```text
//! caller Context.token ──child_token()──► TaskContext.token
//!        (cancel caller) ──────────────►  (task observes cancellation)
//!                         Pool::cancel ─► (task observes cancellation)
//! ```

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::error::TaskError;
use crate::sync::lock;
use crate::tasks::TaskId;

/// Caller-side context: cancellation plus an optional correlation tag.
///
/// The tag is attached to the task's log span so every log line of the
/// task can be traced back to the request that started it.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    tag: Option<Arc<str>>,
}

impl Context {
    /// Creates a fresh, uncancelled context without a tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token, tag: None }
    }

    /// Attaches a correlation tag.
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Derives a child context sharing the tag; cancelling `self` cancels the child.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            tag: self.tag.clone(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels this context and every task started from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl From<CancellationToken> for Context {
    fn from(token: CancellationToken) -> Self {
        Self::with_token(token)
    }
}

/// Latest progress value plus a bounded queue feeding the reporter.
///
/// Updates never block: when the queue is full the update is dropped from
/// the stream, but the latest value is always visible through `get`.
pub(crate) struct Progress {
    value: AtomicU8,
    stream: Mutex<Stream>,
}

struct Stream {
    tx: Option<mpsc::Sender<u8>>,
    changed_at: Option<SystemTime>,
}

impl Progress {
    pub(crate) fn channel(capacity: usize) -> (Arc<Self>, mpsc::Receiver<u8>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let progress = Arc::new(Self {
            value: AtomicU8::new(0),
            stream: Mutex::new(Stream {
                tx: Some(tx),
                changed_at: None,
            }),
        });
        (progress, rx)
    }

    pub(crate) fn set(&self, pct: u8) {
        let pct = pct.min(100);
        let mut stream = lock(&self.stream);
        if self.value.swap(pct, Ordering::Relaxed) != pct {
            stream.changed_at = Some(SystemTime::now());
        }
        if let Some(tx) = stream.tx.as_ref() {
            let _ = tx.try_send(pct);
        }
    }

    pub(crate) fn get(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    /// Time of the last update that changed the value.
    pub(crate) fn changed_at(&self) -> Option<SystemTime> {
        lock(&self.stream).changed_at
    }

    /// Ends the progress stream; later updates only change the stored value.
    pub(crate) fn close(&self) {
        lock(&self.stream).tx.take();
    }
}

/// Context handed to every task hook.
///
/// Cheap to clone. Tasks must watch [`TaskContext::token`] (or call
/// [`TaskContext::check`]) and return [`TaskError::Canceled`] promptly once
/// cancellation is requested; the pool never interrupts a task body.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    kind: &'static str,
    token: CancellationToken,
    tag: Option<Arc<str>>,
    span: Span,
    progress: Arc<Progress>,
}

impl TaskContext {
    pub(crate) fn new(
        id: TaskId,
        kind: &'static str,
        parent: &Context,
        progress: Arc<Progress>,
    ) -> Self {
        let span = tracing::info_span!(
            "task",
            id = %id,
            kind = kind,
            tag = tracing::field::Empty
        );
        if let Some(tag) = parent.tag() {
            span.record("tag", tag);
        }
        Self {
            id,
            kind,
            token: parent.token().child_token(),
            tag: parent.tag.clone(),
            span,
            progress,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Correlation tag inherited from the caller's [`Context`].
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Task cancellation token (child of the caller's token).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Returns `Err(TaskError::Canceled)` if cancellation was requested.
    ///
    /// # Example
    /// ```
    /// # use taskpool::{TaskContext, TaskError};
    /// async fn copy_chunks(ctx: &TaskContext, chunks: u32) -> Result<(), TaskError> {
    ///     for _ in 0..chunks {
    ///         ctx.check()?;
    ///         // copy one chunk...
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn check(&self) -> Result<(), TaskError> {
        if self.token.is_cancelled() {
            Err(TaskError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Records progress (clamped to 0..=100) and forwards it to the reporter.
    pub fn set_progress(&self, pct: u8) {
        self.progress.set(pct);
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Span tagged with the task id, kind and correlation tag.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn progress_is_clamped_and_streamed() {
        let (progress, mut rx) = Progress::channel(4);
        progress.set(40);
        progress.set(250);
        assert_eq!(progress.get(), 100);
        assert_eq!(rx.recv().await, Some(40));
        assert_eq!(rx.recv().await, Some(100));
    }

    #[tokio::test]
    async fn full_queue_drops_updates_but_keeps_latest() {
        let (progress, mut rx) = Progress::channel(1);
        progress.set(10);
        progress.set(20);
        assert_eq!(progress.get(), 20);
        assert_eq!(rx.recv().await, Some(10));
        progress.close();
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn task_token_follows_caller() {
        let caller = Context::new().with_tag("req-7");
        let (progress, _rx) = Progress::channel(1);
        let ctx = TaskContext::new(TaskId::new(), "demo", &caller, progress);
        assert_eq!(ctx.tag(), Some("req-7"));
        assert!(ctx.check().is_ok());

        caller.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.check(), Err(TaskError::Canceled));
    }
}

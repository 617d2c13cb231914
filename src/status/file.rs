//! # Status snapshots on disk.
//!
//! [`persist_stat`] writes a [`TaskStat`] as JSON so it stays readable after
//! the pool evicted the task or the process restarted; [`load_stat`] reads
//! it back. [`FileReporter`] does this automatically for every snapshot the
//! pool emits, one `<task-id>.json` file per task.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never observes a half-written file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::status::{Reporter, TaskStat};
use crate::tasks::TaskId;

/// Errors produced while persisting or loading a snapshot.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StatFileError {
    #[error("stat file io: {0}")]
    Io(#[from] io::Error),

    #[error("stat file encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatFileError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StatFileError::Io(_) => "stat_file_io",
            StatFileError::Json(_) => "stat_file_json",
        }
    }
}

/// Atomically writes `stat` to `path` as pretty JSON.
pub async fn persist_stat(path: impl AsRef<Path>, stat: &TaskStat) -> Result<(), StatFileError> {
    let path = path.as_ref();
    let body = serde_json::to_vec_pretty(stat)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &body).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Reads a snapshot written by [`persist_stat`].
pub async fn load_stat(path: impl AsRef<Path>) -> Result<TaskStat, StatFileError> {
    let body = fs::read(path).await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Reporter that keeps the latest snapshot of every task under a directory.
pub struct FileReporter {
    dir: PathBuf,
}

impl FileReporter {
    /// Stores snapshots in `dir`, which must exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the snapshot file for `id`.
    pub fn path_for(&self, id: TaskId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Loads the last persisted snapshot of `id`.
    pub async fn load(&self, id: TaskId) -> Result<TaskStat, StatFileError> {
        load_stat(self.path_for(id)).await
    }
}

#[async_trait]
impl Reporter for FileReporter {
    async fn send(&self, _ctx: &CancellationToken, stat: &TaskStat) {
        let path = self.path_for(stat.id);
        if let Err(e) = persist_stat(&path, stat).await {
            warn!(task = %stat.id, path = %path.display(), error = %e, label = e.as_label(), "failed to persist task status");
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::status::TaskState;

    fn stat(state: TaskState) -> TaskStat {
        TaskStat {
            id: TaskId::new(),
            kind: "backup".into(),
            state,
            description: None,
            progress: 100,
            details: Some(serde_json::json!({ "disks": ["vda"] })),
            created_at: SystemTime::now(),
            modified_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn persisted_stat_can_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let s = stat(TaskState::Completed);

        persist_stat(&path, &s).await.unwrap();
        let back = load_stat(&path).await.unwrap();

        assert_eq!(back.id, s.id);
        assert_eq!(back.state, TaskState::Completed);
        assert_eq!(back.details, s.details);
        assert!(!dir.path().join("backup.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_reporter_overwrites_with_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = FileReporter::new(dir.path());
        let ctx = CancellationToken::new();

        let mut s = stat(TaskState::Running);
        reporter.send(&ctx, &s).await;
        s.state = TaskState::Failed;
        s.description = Some("context cancelled".into());
        reporter.send(&ctx, &s).await;

        let back = reporter.load(s.id).await.unwrap();
        assert_eq!(back.state, TaskState::Failed);
        assert_eq!(back.description.as_deref(), Some("context cancelled"));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_stat(dir.path().join("nope.json")).await.unwrap_err();
        assert_eq!(err.as_label(), "stat_file_io");
    }
}

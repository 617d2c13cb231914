use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::tasks::{Targets, TaskId};

/// Lifecycle state reported in a [`TaskStat`].
///
/// Cancellation is not a separate state: a cancelled task is `Failed` and
/// its description carries the cancellation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    /// State could not be determined.
    #[default]
    Unknown,
    /// Task is admitted and has not released yet.
    Running,
    /// Task released without an error.
    Completed,
    /// Task released with an error (including cancellation).
    Failed,
}

impl TaskState {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Point-in-time status snapshot of a task.
///
/// Built fresh on every query and never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStat {
    pub id: TaskId,
    /// Kind tag of the task ("migration", "backup", ...).
    pub kind: String,
    pub state: TaskState,
    /// Human-readable failure description (set for `Failed` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Last reported progress, 0..=100.
    pub progress: u8,
    /// Task-defined payload (for example per-disk transfer statistics).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    #[serde(with = "time_serde")]
    pub modified_at: SystemTime,
}

/// Identity and resource footprint of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub id: TaskId,
    pub kind: String,
    pub targets: Targets,
    /// Correlation tag inherited from the caller's context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    #[serde(with = "time_serde")]
    pub modified_at: SystemTime,
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::OperationMode;

    fn stat(state: TaskState, description: Option<&str>) -> TaskStat {
        TaskStat {
            id: TaskId::new(),
            kind: "backup".into(),
            state,
            description: description.map(str::to_string),
            progress: 42,
            details: Some(serde_json::json!({ "disk": "vda", "bytes": 1024 })),
            created_at: SystemTime::now(),
            modified_at: SystemTime::now(),
        }
    }

    #[test]
    fn stat_uses_camel_case_and_unix_seconds() {
        let json = serde_json::to_value(stat(TaskState::Running, None)).unwrap();
        assert_eq!(json["state"], "running");
        assert!(json["createdAt"].is_u64());
        assert!(json["modifiedAt"].is_u64());
        assert!(json.get("description").is_none());
        assert_eq!(json["details"]["disk"], "vda");
    }

    #[test]
    fn failed_stat_survives_json() {
        let s = stat(TaskState::Failed, Some("context cancelled"));
        let back: TaskStat = serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
        assert_eq!(back.state, TaskState::Failed);
        assert_eq!(back.description.as_deref(), Some("context cancelled"));
        assert_eq!(back.details, s.details);
    }

    #[test]
    fn metadata_serializes_targets_as_map() {
        let meta = TaskMetadata {
            id: TaskId::new(),
            kind: "migration".into(),
            targets: Targets::new().with("vm1", OperationMode::BLOCK_ALL),
            tag: Some("req-1".into()),
            created_at: SystemTime::now(),
            modified_at: SystemTime::now(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["targets"]["vm1"], u32::MAX);
        assert_eq!(json["tag"], "req-1");
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Unknown.is_terminal());
    }
}

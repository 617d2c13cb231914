//! # Task status and telemetry.
//!
//! - [`TaskStat`] / [`TaskMetadata`] snapshots returned by pool queries.
//! - [`Reporter`] sink the pool feeds with snapshots and progress streams.
//! - [`ReporterSet`] fan-out over several reporters.
//! - [`FileReporter`], [`persist_stat`], [`load_stat`] JSON snapshots on disk.
//! - `LogReporter` tracing printer (feature `logging`).

mod file;
mod reporter;
mod set;
mod stat;

#[cfg(feature = "logging")]
mod log;

pub use file::{FileReporter, StatFileError, load_stat, persist_stat};
pub use reporter::Reporter;
pub use set::ReporterSet;
pub use stat::{TaskMetadata, TaskState, TaskStat};

#[cfg(feature = "logging")]
pub use log::LogReporter;

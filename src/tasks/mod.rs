//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait for implementing async cancelable tasks
//! - [`TaskFn`] - function-based task implementation
//! - [`TaskId`] - identifier assigned on admission
//! - [`Targets`] / [`OperationMode`] - declared resource footprint
//! - [`Context`] / [`TaskContext`] - caller and task contexts

mod context;
mod id;
mod targets;
mod task;
mod task_fn;

pub use context::{Context, TaskContext};
pub use id::TaskId;
pub use targets::{OperationMode, Targets};
pub use task::Task;
pub use task_fn::TaskFn;

pub(crate) use context::Progress;
pub(crate) use task::{Erased, ErasedTask};

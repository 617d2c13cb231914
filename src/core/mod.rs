//! Pool core: admission and lifecycle.
//!
//! The public API from this module is [`Pool`] (with [`PoolBuilder`] and
//! [`PoolConfig`]), which admits, runs, queries and drains tasks.
//!
//! Internal modules:
//! - [`pool`]: task table, admission algorithm, queries and the execution driver;
//! - [`cell`]: per-task lifecycle state (release, cancel, wait, snapshots);
//! - [`runner`]: runs `main` and the completion hooks inside the task span;
//! - [`drain`]: in-flight counter behind `wait_and_close`;
//! - [`config`] / [`builder`]: construction.

mod builder;
mod cell;
mod config;
mod drain;
mod pool;
mod runner;

pub use builder::PoolBuilder;
pub use config::PoolConfig;
pub use pool::Pool;

pub(crate) use runner::panic_message;

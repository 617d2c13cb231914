//! Caller-side retry policies.
//!
//! The pool rejects conflicting starts instead of queueing them; these knobs
//! control how a caller retries.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so competing callers do not retry in lockstep
//! - [`retry_start`]   retry loop over `start_task` on target conflicts
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=200ms, factor=2.0, max=10s, jitter=Equal.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::retry_start;

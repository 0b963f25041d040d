//! Propagation of the current context to new tasks and threads.
//!
//! This module provides:
//! - `on_task_spawn` / `propagate`, the hook every spawned future goes through
//! - Spawn helpers for tokio tasks, the blocking pool and OS threads
//! - `ContextTaskGroup` for structured groups of propagated tasks

mod propagate;
mod task_group;

pub use propagate::{on_task_spawn, propagate, spawn, spawn_blocking, spawn_thread};
pub use task_group::ContextTaskGroup;

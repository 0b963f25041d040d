//! The task-local carrier of the current snapshot.
//!
//! This module provides:
//! - Per-task slots holding the installed snapshot
//! - Scoped installation with guaranteed restoration
//! - The public scoping API (`with_context`, `batch_set`, `snapshot`, ...)

mod bindings;
mod context;
mod scope;
mod slot;

pub use bindings::{Bindings, EmptyContext, IntoContext};
pub use context::{
    batch_set, restore_to, snapshot, with_bindings, with_bindings_async, with_context,
    with_context_async, with_empty_context, with_empty_context_async, with_snapshot,
    with_snapshot_async,
};
pub use scope::{scoped_install, scoped_install_async};

pub(crate) use slot::scope_sync;

//! Immutable snapshots of context bindings.
//!
//! This module provides:
//! - Type-erased bound values and the `BindingStore` abstraction
//! - The pure merge engine that builds every new snapshot
//! - The `Snapshot` handle installed in carrier slots

mod handle;
mod merge;
mod store;

pub use handle::Snapshot;
pub use merge::{merge, MergeOp};
pub use store::{BindingStore, BoundValue, PersistentStore};

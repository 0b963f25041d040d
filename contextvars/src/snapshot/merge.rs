//! The merge engine: the only constructor of new snapshots.

use super::{BindingStore, BoundValue};
use crate::identity::VariableKey;
use std::sync::Arc;

/// One change to apply to a snapshot.
///
/// `Delete` unbinds the key. It is distinct from `Upsert` of a value that
/// merely represents "nothing", such as `None`.
#[derive(Debug, Clone)]
pub enum MergeOp {
    /// Bind the key to a value, replacing any earlier binding.
    Upsert(BoundValue),
    /// Remove the key's binding.
    Delete,
}

/// Computes a new store from `old` and an ordered list of operations.
///
/// - No operations returns `old` itself (same `Arc`).
/// - Later operations on a key override earlier ones.
/// - A result with no bindings collapses to `None`.
///
/// `old` is never modified.
pub fn merge<S: BindingStore>(
    old: Option<&Arc<S>>,
    ops: &[(VariableKey, MergeOp)],
) -> Option<Arc<S>> {
    if ops.is_empty() {
        return old.cloned();
    }

    let mut next = old.map_or_else(S::empty, |store| S::clone(store));
    for (key, op) in ops {
        match op {
            MergeOp::Upsert(value) => next.insert(*key, value.clone()),
            MergeOp::Delete => next.remove(key),
        }
    }

    if next.is_empty() {
        None
    } else {
        Some(Arc::new(next))
    }
}

//! The opaque snapshot handle held by carrier slots.

use super::{merge, BindingStore, BoundValue, MergeOp, PersistentStore};
use crate::identity::VariableKey;
use std::fmt;
use std::sync::Arc;

/// An immutable point-in-time set of bindings.
///
/// Cloning is a reference-count bump. The empty context is represented by
/// the absence of a store, so `Snapshot::empty()` never allocates.
#[derive(Clone, Default)]
pub struct Snapshot {
    bindings: Option<Arc<PersistentStore>>,
}

impl Snapshot {
    /// The canonical empty snapshot.
    pub const EMPTY: Self = Self { bindings: None };

    /// Returns the canonical empty snapshot.
    #[must_use]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Returns a new snapshot with `ops` applied; see [`merge`].
    #[must_use]
    pub fn apply(&self, ops: &[(VariableKey, MergeOp)]) -> Self {
        Self {
            bindings: merge(self.bindings.as_ref(), ops),
        }
    }

    /// Returns the raw binding for `key`.
    #[must_use]
    pub fn binding(&self, key: &VariableKey) -> Option<&BoundValue> {
        self.bindings.as_ref().and_then(|store| store.get(key))
    }

    /// Returns true if `key` is bound.
    #[must_use]
    pub fn contains_key(&self, key: &VariableKey) -> bool {
        self.binding(key).is_some()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_none()
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.as_ref().map_or(0, |store| store.len())
    }

    /// Returns the bound keys in unspecified order.
    #[must_use]
    pub fn keys(&self) -> Vec<VariableKey> {
        self.bindings
            .as_ref()
            .map_or_else(Vec::new, |store| store.keys())
    }

    /// Returns true if both handles refer to the same underlying store.
    ///
    /// Two empty snapshots are always the same.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.bindings, &other.bindings) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bindings {
            None => f.write_str("Snapshot(<empty>)"),
            Some(store) => f.debug_tuple("Snapshot").field(store).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
        assert!(snapshot.ptr_eq(&Snapshot::default()));
        assert_eq!(format!("{snapshot:?}"), "Snapshot(<empty>)");
    }

    #[test]
    fn test_apply_creates_new_store() {
        let key = VariableKey::random();
        let base = Snapshot::empty();
        let next = base.apply(&[(key, MergeOp::Upsert(BoundValue::new(5_u32)))]);

        assert!(base.is_empty());
        assert!(next.contains_key(&key));
        assert_eq!(next.binding(&key).unwrap().downcast_ref::<u32>(), Some(&5));
        assert!(!next.ptr_eq(&base));
    }

    #[test]
    fn test_apply_without_ops_shares_store() {
        let key = VariableKey::random();
        let base = Snapshot::empty().apply(&[(key, MergeOp::Upsert(BoundValue::new(1_u8)))]);
        let same = base.apply(&[]);
        assert!(same.ptr_eq(&base));
        assert!(!same.ptr_eq(&Snapshot::empty()));
    }

    #[test]
    fn test_clone_shares_store() {
        let key = VariableKey::random();
        let base = Snapshot::empty().apply(&[(key, MergeOp::Upsert(BoundValue::new(1_u8)))]);
        assert!(base.clone().ptr_eq(&base));
        assert_eq!(base.keys(), vec![key]);
    }

    #[test]
    fn test_snapshot_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Snapshot>();
    }
}

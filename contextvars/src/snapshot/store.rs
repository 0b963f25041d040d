//! Storage cells and the binding-store abstraction behind snapshots.

use crate::identity::VariableKey;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased, immutable bound value.
///
/// The concrete type is checked only when a `ContextVar<T>` reads it back.
#[derive(Clone)]
pub struct BoundValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl BoundValue {
    /// Wraps a value.
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns the stored type's name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if both handles share the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Key→value mapping the merge engine builds snapshots from.
///
/// Implementations must be cheap to clone; a clone is the starting point of
/// every copy-on-write update.
pub trait BindingStore: Clone + Send + Sync + 'static {
    /// Returns an empty store.
    fn empty() -> Self;

    /// Looks up a binding.
    fn get(&self, key: &VariableKey) -> Option<&BoundValue>;

    /// Inserts or replaces a binding.
    fn insert(&mut self, key: VariableKey, value: BoundValue);

    /// Removes a binding if present.
    fn remove(&mut self, key: &VariableKey);

    /// Returns the number of bindings.
    fn len(&self) -> usize;

    /// Returns true if there are no bindings.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bound keys in unspecified order.
    fn keys(&self) -> Vec<VariableKey>;
}

/// The production store: a persistent hash map with structural sharing.
#[derive(Clone, Default)]
pub struct PersistentStore {
    map: im::HashMap<VariableKey, BoundValue>,
}

impl BindingStore for PersistentStore {
    fn empty() -> Self {
        Self::default()
    }

    fn get(&self, key: &VariableKey) -> Option<&BoundValue> {
        self.map.get(key)
    }

    fn insert(&mut self, key: VariableKey, value: BoundValue) {
        self.map.insert(key, value);
    }

    fn remove(&mut self, key: &VariableKey) {
        self.map.remove(key);
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn keys(&self) -> Vec<VariableKey> {
        self.map.keys().copied().collect()
    }
}

impl fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.map.iter().map(|(k, v)| (k, v.type_name())))
            .finish()
    }
}

//! Ordered binding sets and the sources a scoped call can install.

use crate::errors::TypeCoercionError;
use crate::identity::{ContextValue, ContextVar, VariableKey};
use crate::snapshot::{BoundValue, MergeOp, Snapshot};
use serde::de::DeserializeOwned;

/// An ordered list of binding changes.
///
/// Values are converted to the variable's type while the list is built, so a
/// coercion failure never reaches the merge and leaves the context as it was.
/// Later entries for the same variable override earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    ops: Vec<(VariableKey, MergeOp)>,
}

impl Bindings {
    /// Creates an empty binding list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `var` to `value`.
    #[must_use]
    pub fn set<T: ContextValue>(mut self, var: &ContextVar<T>, value: impl Into<T>) -> Self {
        let value: T = value.into();
        self.ops
            .push((var.key(), MergeOp::Upsert(BoundValue::new(value))));
        self
    }

    /// Binds `var` to a dynamic value converted to the variable's type.
    ///
    /// # Errors
    ///
    /// Returns `TypeCoercionError` if the value does not convert exactly.
    pub fn set_value<T>(
        mut self,
        var: &ContextVar<T>,
        value: serde_json::Value,
    ) -> Result<Self, TypeCoercionError>
    where
        T: ContextValue + DeserializeOwned,
    {
        let converted = var.convert(value)?;
        self.ops
            .push((var.key(), MergeOp::Upsert(BoundValue::new(converted))));
        Ok(self)
    }

    /// Unbinds `var`, so reads fall back to its default.
    #[must_use]
    pub fn clear<T: ContextValue>(mut self, var: &ContextVar<T>) -> Self {
        self.ops.push((var.key(), MergeOp::Delete));
        self
    }

    /// Appends a raw operation.
    pub fn push(&mut self, key: VariableKey, op: MergeOp) {
        self.ops.push((key, op));
    }

    /// Returns the operations in order.
    #[must_use]
    pub fn ops(&self) -> &[(VariableKey, MergeOp)] {
        &self.ops
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if there are no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Marker for running code with no bindings at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyContext;

/// Something a scoped call can install as the ambient snapshot.
pub trait IntoContext {
    /// Resolves to the snapshot to install, given the current one.
    fn into_snapshot(self, current: &Snapshot) -> Snapshot;
}

impl IntoContext for Bindings {
    fn into_snapshot(self, current: &Snapshot) -> Snapshot {
        current.apply(&self.ops)
    }
}

impl IntoContext for &Bindings {
    fn into_snapshot(self, current: &Snapshot) -> Snapshot {
        current.apply(&self.ops)
    }
}

impl IntoContext for EmptyContext {
    fn into_snapshot(self, _current: &Snapshot) -> Snapshot {
        Snapshot::empty()
    }
}

impl IntoContext for Snapshot {
    fn into_snapshot(self, _current: &Snapshot) -> Snapshot {
        self
    }
}

impl IntoContext for &Snapshot {
    fn into_snapshot(self, _current: &Snapshot) -> Snapshot {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_coercion_failure_keeps_list() {
        let var = ContextVar::<i64>::builder("n").declare_local().unwrap();
        let bindings = Bindings::new().set(&var, 1_i64);

        let result = bindings.clone().set_value(&var, serde_json::json!(0.5));
        assert!(result.is_err());
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn test_set_value_accepts_exact_float() {
        let var = ContextVar::<i64>::builder("n").declare_local().unwrap();
        let bindings = Bindings::new()
            .set_value(&var, serde_json::json!(2.0))
            .unwrap();

        let snapshot = bindings.into_snapshot(&Snapshot::empty());
        assert_eq!(var.get_in(&snapshot), Some(2));
    }

    #[test]
    fn test_empty_bindings_share_current() {
        let var = ContextVar::<i64>::builder("n").declare_local().unwrap();
        let current = Bindings::new().set(&var, 1_i64).into_snapshot(&Snapshot::empty());

        let resolved = Bindings::new().into_snapshot(&current);
        assert!(resolved.ptr_eq(&current));
    }

    #[test]
    fn test_empty_context_ignores_current() {
        let var = ContextVar::<i64>::builder("n").declare_local().unwrap();
        let current = Bindings::new().set(&var, 1_i64).into_snapshot(&Snapshot::empty());
        assert!(EmptyContext.into_snapshot(&current).is_empty());
    }

    #[test]
    fn test_clear_then_set_order() {
        let var = ContextVar::<i64>::builder("n").declare_local().unwrap();
        let snapshot = Bindings::new()
            .clear(&var)
            .set(&var, 3_i64)
            .into_snapshot(&Snapshot::empty());
        assert_eq!(var.get_in(&snapshot), Some(3));

        let snapshot = Bindings::new()
            .set(&var, 3_i64)
            .clear(&var)
            .into_snapshot(&Snapshot::empty());
        assert!(snapshot.is_empty());
    }
}

//! Typed context variable handles and their builder.

use super::coerce::coerce_value;
use super::key::validate;
use super::{DeclarationKind, DeclarationRecord, DeclarationRegistry, Scope, VariableKey};
use crate::carrier::{self, Bindings};
use crate::config::DeclarationConfig;
use crate::errors::{
    DuplicateLocalDeclarationWarning, InvalidNameError, TypeCoercionError,
    UnassignedVariableError,
};
use crate::snapshot::Snapshot;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::warn;

/// Values that can be bound to a context variable.
///
/// Bound values are shared between tasks by reference, so they must be
/// `Send + Sync`. Interior mutability inside a value is the caller's concern.
pub trait ContextValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> ContextValue for T {}

struct VariableInfo<T> {
    key: VariableKey,
    name: String,
    scope: Scope,
    kind: DeclarationKind,
    separator: char,
    default: Option<T>,
}

/// A declared context variable.
///
/// The handle is immutable and cheap to clone. Its effective value depends on
/// the snapshot installed in the calling task.
pub struct ContextVar<T> {
    info: Arc<VariableInfo<T>>,
}

impl<T: ContextValue> ContextVar<T> {
    /// Starts declaring a variable called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ContextVarBuilder<T> {
        ContextVarBuilder::new(name)
    }

    /// Returns the variable key.
    #[must_use]
    pub fn key(&self) -> VariableKey {
        self.info.key
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns the declaring scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.info.scope
    }

    /// Returns the scope path and name joined by the separator.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.info.scope.qualify(&self.info.name, self.info.separator)
    }

    /// Returns how the key was produced.
    #[must_use]
    pub fn kind(&self) -> DeclarationKind {
        self.info.kind
    }

    /// Returns true if the variable has a default.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.info.default.is_some()
    }

    /// Returns the default, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&T> {
        self.info.default.as_ref()
    }

    /// Returns the declared value type's name.
    #[must_use]
    pub fn value_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    /// Reads the variable in the current context.
    ///
    /// Returns the bound value, else the default, else `None`. A variable of
    /// type `Option<U>` bound to `None` reads as `Some(None)`.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.get_in(&carrier::snapshot())
    }

    /// Reads the variable, failing if it is unbound and has no default.
    pub fn get_strict(&self) -> Result<T, UnassignedVariableError> {
        self.get().ok_or_else(|| {
            UnassignedVariableError::new(self.qualified_name(), self.info.key.to_string())
        })
    }

    /// Reads the variable, falling back to `fallback` when unassigned.
    #[must_use]
    pub fn get_or(&self, fallback: T) -> T {
        self.get().unwrap_or(fallback)
    }

    /// Returns true if the current context binds this variable.
    ///
    /// Defaults do not count.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        carrier::snapshot()
            .binding(&self.info.key)
            .is_some_and(|value| value.downcast_ref::<T>().is_some())
    }

    /// Reads the variable from an explicit snapshot.
    #[must_use]
    pub fn get_in(&self, snapshot: &Snapshot) -> Option<T> {
        self.bound_in(snapshot)
            .or_else(|| self.info.default.clone())
    }

    /// Reads only the binding in `snapshot`, ignoring the default.
    #[must_use]
    pub fn bound_in(&self, snapshot: &Snapshot) -> Option<T> {
        let value = snapshot.binding(&self.info.key)?;
        match value.downcast_ref::<T>() {
            Some(typed) => Some(typed.clone()),
            None => {
                warn!(
                    variable = %self.qualified_name(),
                    expected_type = self.value_type(),
                    stored_type = value.type_name(),
                    "Context binding has a different type than the variable; treating as unbound"
                );
                None
            }
        }
    }

    /// Converts a dynamic value to this variable's type.
    pub fn convert(&self, value: serde_json::Value) -> Result<T, TypeCoercionError>
    where
        T: DeserializeOwned,
    {
        coerce_value(&self.qualified_name(), value)
    }

    /// Runs `f` with this variable bound to `value`.
    pub fn with<R>(&self, value: impl Into<T>, f: impl FnOnce() -> R) -> R {
        carrier::with_bindings(&Bindings::new().set(self, value), f)
    }

    /// Runs `fut` with this variable bound to `value`.
    pub fn with_async<F: Future>(
        &self,
        value: impl Into<T>,
        fut: F,
    ) -> impl Future<Output = F::Output> {
        carrier::with_context_async(Bindings::new().set(self, value), fut)
    }
}

impl<T> Clone for ContextVar<T> {
    fn clone(&self) -> Self {
        Self {
            info: Arc::clone(&self.info),
        }
    }
}

impl<T> PartialEq for ContextVar<T> {
    fn eq(&self, other: &Self) -> bool {
        self.info.key == other.info.key
    }
}

impl<T> Eq for ContextVar<T> {}

impl<T> Hash for ContextVar<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.key.hash(state);
    }
}

impl<T> fmt::Debug for ContextVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextVar")
            .field("name", &self.info.name)
            .field("scope", &self.info.scope)
            .field("key", &self.info.key)
            .field("kind", &self.info.kind)
            .field("value_type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Builder for `ContextVar`.
#[derive(Debug, Clone)]
pub struct ContextVarBuilder<T> {
    name: String,
    scope: Scope,
    default: Option<T>,
    config: DeclarationConfig,
}

impl<T: ContextValue> ContextVarBuilder<T> {
    /// Creates a builder for a root-scoped variable without a default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::root(),
            default: None,
            config: DeclarationConfig::default(),
        }
    }

    /// Sets the declaring scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<T>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the declaration configuration.
    #[must_use]
    pub fn with_config(mut self, config: DeclarationConfig) -> Self {
        self.config = config;
        self
    }

    /// Declares a variable with a key derived from scope and name.
    ///
    /// Declaring the same scope and name again yields an equal variable.
    pub fn declare(self) -> Result<ContextVar<T>, InvalidNameError> {
        let key = VariableKey::derive(&self.config, &self.scope, &self.name)?;
        if self.config.track_declarations {
            DeclarationRegistry::global().record(DeclarationRecord::new(
                key,
                self.scope.qualify(&self.name, self.config.separator),
                std::any::type_name::<T>(),
                DeclarationKind::Deterministic,
            ));
        }
        Ok(self.build(key, DeclarationKind::Deterministic))
    }

    /// Declares a variable with a fresh random key.
    ///
    /// Every call yields a distinct variable, even for the same scope and
    /// name, so shadowing declarations never share bindings.
    pub fn declare_local(self) -> Result<ContextVar<T>, InvalidNameError> {
        self.declare_local_with_warning().map(|(var, _)| var)
    }

    /// Like `declare_local`, also returning the warning raised when the same
    /// qualified name was declared locally before.
    ///
    /// The warning is `None` on first declaration or when declaration
    /// tracking is disabled.
    pub fn declare_local_with_warning(
        self,
    ) -> Result<(ContextVar<T>, Option<DuplicateLocalDeclarationWarning>), InvalidNameError> {
        validate(&self.scope, &self.name, self.config.separator)?;
        let warning = if self.config.track_declarations {
            DeclarationRegistry::global()
                .record_local(&self.scope.qualify(&self.name, self.config.separator))
        } else {
            None
        };
        Ok((self.build(VariableKey::random(), DeclarationKind::Local), warning))
    }

    fn build(self, key: VariableKey, kind: DeclarationKind) -> ContextVar<T> {
        ContextVar {
            info: Arc::new(VariableInfo {
                key,
                name: self.name,
                scope: self.scope,
                kind,
                separator: self.config.separator,
                default: self.default,
            }),
        }
    }
}

/// Declares a variable with a deterministic key.
pub fn declare<T: ContextValue>(
    name: &str,
    scope: &Scope,
    default: Option<T>,
) -> Result<ContextVar<T>, InvalidNameError> {
    let mut builder = ContextVarBuilder::new(name).with_scope(scope.clone());
    builder.default = default;
    builder.declare()
}

/// Declares a variable with a fresh random key.
pub fn declare_local<T: ContextValue>(
    name: &str,
    scope: &Scope,
    default: Option<T>,
) -> Result<ContextVar<T>, InvalidNameError> {
    let mut builder = ContextVarBuilder::new(name).with_scope(scope.clone());
    builder.default = default;
    builder.declare_local()
}

//! Error types for context variables.
//!
//! Every error is surfaced synchronously to the caller of the operation that
//! triggered it. None of them are raised by the restoration step of a scoped
//! install, which only reassigns a reference and cannot fail.

use std::collections::HashMap;
use thiserror::Error;

/// The main error type for context variable operations.
#[derive(Debug, Clone, Error)]
pub enum ContextVarError {
    /// A declaration used a malformed name or scope component.
    #[error("{0}")]
    InvalidName(#[from] InvalidNameError),

    /// A written value could not be converted to the variable's type.
    #[error("{0}")]
    TypeCoercion(#[from] TypeCoercionError),

    /// A strict read found neither a binding nor a default.
    #[error("{0}")]
    Unassigned(#[from] UnassignedVariableError),
}

impl ContextVarError {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        match self {
            Self::InvalidName(err) => err.to_dict(),
            Self::TypeCoercion(err) => err.to_dict(),
            Self::Unassigned(err) => err.to_dict(),
        }
    }
}

/// Error raised when a declaration name or scope component is malformed.
///
/// Fatal at declaration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid context variable name '{name}': {reason}")]
pub struct InvalidNameError {
    /// The offending name or scope component.
    pub name: String,
    /// Which part of the declaration was rejected (`"name"` or `"scope"`).
    pub component: &'static str,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidNameError {
    /// Creates an error for a rejected variable name.
    #[must_use]
    pub fn name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: "name",
            reason: reason.into(),
        }
    }

    /// Creates an error for a rejected scope path component.
    #[must_use]
    pub fn scope(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: component.into(),
            component: "scope",
            reason: reason.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("InvalidNameError"));
        map.insert("name".to_string(), serde_json::json!(self.name));
        map.insert("component".to_string(), serde_json::json!(self.component));
        map.insert("reason".to_string(), serde_json::json!(self.reason));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Error raised when a written value cannot be converted to the declared type.
///
/// The ambient context is left unmodified.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot store {value} in context variable '{variable}' of type {expected_type}: {reason}")]
pub struct TypeCoercionError {
    /// The variable's display name.
    pub variable: String,
    /// The variable's declared value type.
    pub expected_type: &'static str,
    /// The rejected value.
    pub value: serde_json::Value,
    /// The conversion failure.
    pub reason: String,
}

impl TypeCoercionError {
    /// Creates a new type coercion error.
    #[must_use]
    pub fn new(
        variable: impl Into<String>,
        expected_type: &'static str,
        value: serde_json::Value,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            expected_type,
            value,
            reason: reason.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("TypeCoercionError"));
        map.insert("variable".to_string(), serde_json::json!(self.variable));
        map.insert(
            "expected_type".to_string(),
            serde_json::json!(self.expected_type),
        );
        map.insert("value".to_string(), self.value.clone());
        map.insert("reason".to_string(), serde_json::json!(self.reason));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Error raised by a strict read of an unbound variable without a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Context variable '{variable}' has no value bound in the current context and no default")]
pub struct UnassignedVariableError {
    /// The variable's qualified display name.
    pub variable: String,
    /// The variable's key, rendered as a string.
    pub key: String,
}

impl UnassignedVariableError {
    /// Creates a new unassigned variable error.
    #[must_use]
    pub fn new(variable: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            key: key.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "type".to_string(),
            serde_json::json!("UnassignedVariableError"),
        );
        map.insert("variable".to_string(), serde_json::json!(self.variable));
        map.insert("key".to_string(), serde_json::json!(self.key));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Non-fatal notice that a local variable was declared again.
///
/// Re-declaring a local variable on every invocation of the code that owns
/// it is expected; this value only exists so callers and tests can observe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateLocalDeclarationWarning {
    /// The qualified name of the redeclared variable.
    pub qualified_name: String,
    /// How many local declarations with this name have been recorded.
    pub occurrences: u64,
}

impl std::fmt::Display for DuplicateLocalDeclarationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Local context variable '{}' declared {} times; each declaration has its own key",
            self.qualified_name, self.occurrences
        )
    }
}

/// Error reported by `ContextTaskGroup::wait` for the first task that did not
/// complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskGroupError {
    /// The task returned an error.
    #[error("Task '{name}' failed: {message}")]
    Failed {
        /// The task name.
        name: String,
        /// The rendered task error.
        message: String,
    },

    /// The task panicked.
    #[error("Task '{name}' panicked: {message}")]
    Panicked {
        /// The task name.
        name: String,
        /// The panic message, if it was a string.
        message: String,
    },

    /// The task was aborted before it finished.
    #[error("Task '{name}' cancelled: {reason}")]
    Cancelled {
        /// The task name.
        name: String,
        /// The reason given to `cancel_all`, or a description of the abort.
        reason: String,
    },
}

impl TaskGroupError {
    /// Returns the name of the task that caused the error.
    #[must_use]
    pub fn task_name(&self) -> &str {
        match self {
            Self::Failed { name, .. } | Self::Panicked { name, .. } | Self::Cancelled { name, .. } => {
                name
            }
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::Failed { .. } => "failed",
            Self::Panicked { .. } => "panicked",
            Self::Cancelled { .. } => "cancelled",
        };
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("TaskGroupError"));
        map.insert("kind".to_string(), serde_json::json!(kind));
        map.insert("task".to_string(), serde_json::json!(self.task_name()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_error_to_dict() {
        let err = InvalidNameError::name("a.b", "contains separator '.'");
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "InvalidNameError");
        assert_eq!(dict.get("component").unwrap(), "name");
        assert!(err.to_string().contains("a.b"));
    }

    #[test]
    fn test_scope_error_component() {
        let err = InvalidNameError::scope("", "empty scope component");
        assert_eq!(err.component, "scope");
    }

    #[test]
    fn test_type_coercion_error_message() {
        let err = TypeCoercionError::new("retries", "i64", serde_json::json!(0.5), "not integral");
        assert!(err.to_string().contains("retries"));
        assert!(err.to_string().contains("0.5"));
        assert_eq!(err.to_dict().get("value").unwrap(), &serde_json::json!(0.5));
    }

    #[test]
    fn test_umbrella_error_from() {
        let err: ContextVarError = UnassignedVariableError::new("app.user", "k").into();
        assert!(matches!(err, ContextVarError::Unassigned(_)));
        assert_eq!(err.to_dict().get("type").unwrap(), "UnassignedVariableError");
    }

    #[test]
    fn test_duplicate_local_warning_display() {
        let warning = DuplicateLocalDeclarationWarning {
            qualified_name: "handler.tmp".to_string(),
            occurrences: 2,
        };
        assert!(warning.to_string().contains("handler.tmp"));
    }

    #[test]
    fn test_task_group_error_to_dict() {
        let err = TaskGroupError::Cancelled {
            name: "fetch".to_string(),
            reason: "shutdown".to_string(),
        };
        assert_eq!(err.task_name(), "fetch");

        let dict = err.to_dict();
        assert_eq!(dict.get("kind").unwrap(), "cancelled");
        assert!(err.to_string().contains("shutdown"));
    }
}

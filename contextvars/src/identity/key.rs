//! Variable keys, declaring scopes, and key derivation.

use crate::config::DeclarationConfig;
use crate::errors::InvalidNameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The process-wide identity of a context variable.
///
/// Equality of variables is equality of keys, never of names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableKey(Uuid);

impl VariableKey {
    /// Draws a fresh random 128-bit key.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives the deterministic key for `name` declared in `scope`.
    ///
    /// The same `(scope, name)` pair always yields the same key under the same
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidNameError` if the name or a scope component is empty or
    /// contains the configured separator.
    pub fn derive(
        config: &DeclarationConfig,
        scope: &Scope,
        name: &str,
    ) -> Result<Self, InvalidNameError> {
        validate(scope, name, config.separator)?;
        let qualified = scope.qualify(name, config.separator);
        Ok(Self(Uuid::new_v5(&config.namespace, qualified.as_bytes())))
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The declaring scope of a variable, as an ordered path of components.
///
/// The root scope has no components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    path: Vec<String>,
}

impl Scope {
    /// Returns the root scope.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a scope from path components, outermost first.
    #[must_use]
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a nested scope with one more component.
    #[must_use]
    pub fn child(&self, component: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(component.into());
        Self { path }
    }

    /// Returns the path components.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.path
    }

    /// Returns true for the root scope.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Joins the scope path and `name` with `separator`.
    #[must_use]
    pub fn qualify(&self, name: &str, separator: char) -> String {
        let mut qualified = String::new();
        for component in &self.path {
            qualified.push_str(component);
            qualified.push(separator);
        }
        qualified.push_str(name);
        qualified
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.path.join("."))
    }
}

/// Checks that `name` and every scope component are usable in key derivation.
pub(crate) fn validate(scope: &Scope, name: &str, separator: char) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::name(name, "name is empty"));
    }
    if name.contains(separator) {
        return Err(InvalidNameError::name(
            name,
            format!("name contains the separator '{separator}'"),
        ));
    }
    for component in scope.components() {
        if component.is_empty() {
            return Err(InvalidNameError::scope(
                component.as_str(),
                "scope component is empty",
            ));
        }
        if component.contains(separator) {
            return Err(InvalidNameError::scope(
                component.as_str(),
                format!("scope component contains the separator '{separator}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_key_is_stable() {
        let config = DeclarationConfig::default();
        let scope = Scope::new(["app", "db"]);

        let first = VariableKey::derive(&config, &scope, "pool").unwrap();
        let second = VariableKey::derive(&config, &scope, "pool").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_derived_key_depends_on_scope() {
        let config = DeclarationConfig::default();
        let a = VariableKey::derive(&config, &Scope::new(["app"]), "pool").unwrap();
        let b = VariableKey::derive(&config, &Scope::new(["lib"]), "pool").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derived_key_depends_on_namespace() {
        let scope = Scope::root();
        let a = VariableKey::derive(&DeclarationConfig::default(), &scope, "x").unwrap();
        let b = VariableKey::derive(
            &DeclarationConfig::default().with_namespace(Uuid::new_v4()),
            &scope,
            "x",
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_separator_in_name_rejected() {
        let config = DeclarationConfig::default();
        let err = VariableKey::derive(&config, &Scope::new(["a"]), "b.c").unwrap_err();
        assert_eq!(err.component, "name");
    }

    #[test]
    fn test_separator_in_scope_rejected() {
        // "a.b" + "c" would otherwise collide with "a" + "b.c"
        let config = DeclarationConfig::default();
        let err = VariableKey::derive(&config, &Scope::new(["a.b"]), "c").unwrap_err();
        assert_eq!(err.component, "scope");
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = DeclarationConfig::default();
        assert!(VariableKey::derive(&config, &Scope::root(), "").is_err());
        assert!(VariableKey::derive(&config, &Scope::new([""]), "x").is_err());
    }

    #[test]
    fn test_custom_separator() {
        let config = DeclarationConfig::default().with_separator('/');
        assert!(VariableKey::derive(&config, &Scope::new(["a.b"]), "c").is_ok());
        assert!(VariableKey::derive(&config, &Scope::new(["a/b"]), "c").is_err());
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(VariableKey::random(), VariableKey::random());
    }

    #[test]
    fn test_scope_qualify_and_display() {
        let scope = Scope::new(["app"]).child("http");
        assert_eq!(scope.qualify("request_id", '.'), "app.http.request_id");
        assert_eq!(scope.to_string(), "app.http");
        assert_eq!(Scope::root().to_string(), "<root>");
        assert!(Scope::root().is_root());
    }
}

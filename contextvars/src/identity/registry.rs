//! Registry of variable declarations for diagnostics.

use super::VariableKey;
use crate::errors::DuplicateLocalDeclarationWarning;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// How a variable's key was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// Key derived from scope path and name; stable across re-evaluation.
    Deterministic,
    /// Fresh random key per declaration.
    Local,
}

/// A recorded declaration.
#[derive(Debug, Clone, Serialize)]
pub struct DeclarationRecord {
    /// The variable key.
    pub key: VariableKey,
    /// Scope path and name joined by the separator.
    pub qualified_name: String,
    /// The declared value type.
    pub type_name: &'static str,
    /// How the key was produced.
    pub kind: DeclarationKind,
    /// When the declaration was recorded.
    pub declared_at: DateTime<Utc>,
}

impl DeclarationRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        key: VariableKey,
        qualified_name: impl Into<String>,
        type_name: &'static str,
        kind: DeclarationKind,
    ) -> Self {
        Self {
            key,
            qualified_name: qualified_name.into(),
            type_name,
            kind,
            declared_at: Utc::now(),
        }
    }
}

/// Result of recording a deterministic declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redeclaration {
    /// First declaration of this key.
    New,
    /// Same key declared again with the same type.
    Unchanged,
    /// Same key declared again with a different type.
    TypeChanged {
        /// The type recorded by the earlier declaration.
        previous: &'static str,
    },
}

/// Concurrent registry of declarations.
#[derive(Debug, Default)]
pub struct DeclarationRegistry {
    deterministic: DashMap<VariableKey, DeclarationRecord>,
    locals: DashMap<String, u64>,
}

static GLOBAL_REGISTRY: OnceLock<DeclarationRegistry> = OnceLock::new();

impl DeclarationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry used by `ContextVarBuilder`.
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(Self::new)
    }

    /// Records a deterministic declaration.
    ///
    /// A type change keeps the key and replaces the record.
    pub fn record(&self, record: DeclarationRecord) -> Redeclaration {
        let key = record.key;
        let type_name = record.type_name;
        let qualified_name = record.qualified_name.clone();

        match self.deterministic.insert(key, record) {
            None => {
                debug!(%key, variable = %qualified_name, type_name, "Declared context variable");
                Redeclaration::New
            }
            Some(previous) if previous.type_name == type_name => Redeclaration::Unchanged,
            Some(previous) => {
                warn!(
                    %key,
                    variable = %qualified_name,
                    previous_type = previous.type_name,
                    type_name,
                    "Context variable redeclared with a different type"
                );
                Redeclaration::TypeChanged {
                    previous: previous.type_name,
                }
            }
        }
    }

    /// Records a local declaration.
    ///
    /// Returns a warning on every declaration after the first with the same
    /// qualified name. The warning is informational only.
    pub fn record_local(&self, qualified_name: &str) -> Option<DuplicateLocalDeclarationWarning> {
        let occurrences = {
            let mut count = self.locals.entry(qualified_name.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if occurrences > 1 {
            let warning = DuplicateLocalDeclarationWarning {
                qualified_name: qualified_name.to_string(),
                occurrences,
            };
            debug!(variable = %qualified_name, occurrences, "{}", warning);
            Some(warning)
        } else {
            None
        }
    }

    /// Returns the record for a deterministic key.
    #[must_use]
    pub fn get(&self, key: &VariableKey) -> Option<DeclarationRecord> {
        self.deterministic.get(key).map(|entry| entry.value().clone())
    }

    /// Returns the number of deterministic declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deterministic.len()
    }

    /// Returns true if no deterministic declarations are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deterministic.is_empty()
    }

    /// Returns how many local declarations used `qualified_name`.
    #[must_use]
    pub fn local_count(&self, qualified_name: &str) -> u64 {
        self.locals.get(qualified_name).map_or(0, |count| *count)
    }
}

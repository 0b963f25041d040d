//! Configuration types for variable declaration and logging.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default UUIDv5 namespace for deterministic variable keys.
pub const DEFAULT_KEY_NAMESPACE: Uuid = Uuid::from_u128(0x2d7e_48a1_9c3f_4b5e_8f0a_6c1d_3e9b_7a42);

/// Default separator between scope components and the variable name.
pub const DEFAULT_SEPARATOR: char = '.';

/// Configuration for declaring context variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationConfig {
    /// Namespace used to derive deterministic keys.
    #[serde(default = "default_namespace")]
    pub namespace: Uuid,
    /// Separator joining scope components and the name during key derivation.
    ///
    /// Names and scope components may not contain it.
    #[serde(default = "default_separator")]
    pub separator: char,
    /// Whether declarations are recorded in the global registry.
    #[serde(default = "default_track_declarations")]
    pub track_declarations: bool,
}

fn default_namespace() -> Uuid {
    DEFAULT_KEY_NAMESPACE
}

fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

fn default_track_declarations() -> bool {
    true
}

impl Default for DeclarationConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            separator: default_separator(),
            track_declarations: default_track_declarations(),
        }
    }
}

impl DeclarationConfig {
    /// Creates a declaration configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Uuid) -> Self {
        self.namespace = namespace;
        self
    }

    /// Sets the key separator.
    #[must_use]
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Enables or disables registry tracking.
    #[must_use]
    pub fn with_track_declarations(mut self, track: bool) -> Self {
        self.track_declarations = track;
        self
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// `EnvFilter` directive string.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl TracingConfig {
    /// Creates a tracing configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

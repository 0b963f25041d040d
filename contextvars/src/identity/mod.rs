//! Variable identity: keys, scopes, typed handles, and declaration tracking.

mod coerce;
mod key;
mod registry;
mod variable;

pub use key::{Scope, VariableKey};
pub use registry::{DeclarationKind, DeclarationRecord, DeclarationRegistry, Redeclaration};
pub use variable::{declare, declare_local, ContextValue, ContextVar, ContextVarBuilder};

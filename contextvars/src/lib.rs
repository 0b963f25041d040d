//! # Contextvars
//!
//! Task-scoped context variables for async Rust.
//!
//! A context variable is a typed handle whose value depends on the task that
//! reads it. Values live in immutable snapshots that tasks share freely:
//!
//! - **Identity**: variables are declared once and keyed by a UUID that is
//!   either derived from their qualified name or unique per declaration
//! - **Snapshots**: every rebinding builds a new persistent map and leaves
//!   the old one untouched, so readers never race with writers
//! - **Scoped binding**: `with_bindings` installs a snapshot for one call and
//!   restores the previous one on return, error, panic, or cancellation
//! - **Propagation**: spawned tasks start from the snapshot current at spawn
//!   time and never observe each other's changes afterwards
//! - **Event transport**: sinks carry the snapshot they were created under
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contextvars::prelude::*;
//!
//! let request_id = ContextVar::<String>::builder("request_id")
//!     .with_scope(Scope::new(["http"]))
//!     .declare()?;
//!
//! with_bindings(&Bindings::new().set(&request_id, "req-42"), || {
//!     let handle = spawn(async move { request_id.get() });
//!     // the child sees Some("req-42")
//! });
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod carrier;
pub mod config;
pub mod errors;
pub mod events;
pub mod identity;
pub mod observability;
pub mod snapshot;
pub mod spawn;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::carrier::{
        batch_set, restore_to, snapshot, with_bindings, with_bindings_async, with_context,
        with_context_async, with_empty_context, with_empty_context_async, with_snapshot,
        with_snapshot_async, Bindings, EmptyContext, IntoContext,
    };
    pub use crate::config::{DeclarationConfig, TracingConfig};
    pub use crate::errors::{
        ContextVarError, DuplicateLocalDeclarationWarning, InvalidNameError, TaskGroupError,
        TypeCoercionError, UnassignedVariableError,
    };
    pub use crate::events::{
        current_event_sink, try_emit_event, with_event_sink, ContextSink, EventSink,
        LoggingEventSink, NoOpEventSink,
    };
    pub use crate::identity::{declare, declare_local, ContextValue, ContextVar, Scope, VariableKey};
    pub use crate::snapshot::{MergeOp, Snapshot};
    pub use crate::spawn::{on_task_spawn, propagate, spawn, ContextTaskGroup};
}

//! Event sinks and the context-carrying transport shim.
//!
//! This module provides:
//! - The `EventSink` trait and basic sinks
//! - `ContextSink`, which delivers to a sink under a captured snapshot
//! - The ambient sink resolved per task, per thread, then process-wide

mod ambient;
mod shim;
mod sink;

pub use ambient::{
    clear_event_sink, clear_global_event_sink, current_event_sink, emit_event,
    set_event_sink, set_global_event_sink, try_emit_event, with_event_sink,
    with_event_sink_async,
};
pub use shim::{payload_of, unwrap, wrap, wrap_with, ContextSink};
pub use sink::{CollectedEvent, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

pub(crate) use ambient::{local_sink, scope_future, scope_sync};

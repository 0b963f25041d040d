//! Decorator that carries a snapshot alongside an event sink.

use super::EventSink;
use crate::carrier::{self, scoped_install_async};
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// An event sink that delivers to its base sink under a fixed snapshot.
///
/// Every `EventSink` operation is forwarded to the base unchanged; the only
/// addition is that the payload is the ambient context while the base runs.
/// A `ContextSink` never wraps another one.
#[derive(Clone)]
pub struct ContextSink {
    base: Arc<dyn EventSink>,
    payload: Snapshot,
}

impl ContextSink {
    /// Creates a shim around `base` carrying `payload`.
    ///
    /// If `base` is itself a shim, its own base is used instead.
    #[must_use]
    pub fn new(base: Arc<dyn EventSink>, payload: Snapshot) -> Self {
        let inner = base.as_context_sink().map(|shim| Arc::clone(&shim.base));
        Self {
            base: inner.unwrap_or(base),
            payload,
        }
    }

    /// Returns the wrapped sink.
    #[must_use]
    pub fn base(&self) -> &Arc<dyn EventSink> {
        &self.base
    }

    /// Returns the carried snapshot.
    #[must_use]
    pub fn payload(&self) -> &Snapshot {
        &self.payload
    }

    /// Returns a shim over the same base carrying `payload`.
    #[must_use]
    pub fn with_payload(&self, payload: Snapshot) -> Self {
        Self {
            base: Arc::clone(&self.base),
            payload,
        }
    }
}

impl fmt::Debug for ContextSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSink")
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventSink for ContextSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        scoped_install_async(self.payload.clone(), self.base.emit(event_type, data)).await;
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        carrier::with_snapshot(&self.payload, || self.base.try_emit(event_type, data));
    }

    fn enabled(&self, event_type: &str) -> bool {
        self.base.enabled(event_type)
    }

    fn as_context_sink(&self) -> Option<&ContextSink> {
        Some(self)
    }
}

/// Wraps `base` with the current snapshot.
#[must_use]
pub fn wrap(base: Arc<dyn EventSink>) -> Arc<dyn EventSink> {
    wrap_with(base, carrier::snapshot())
}

/// Wraps `base` with an explicit snapshot.
#[must_use]
pub fn wrap_with(base: Arc<dyn EventSink>, payload: Snapshot) -> Arc<dyn EventSink> {
    Arc::new(ContextSink::new(base, payload))
}

/// Returns the sink underneath a shim, or `sink` itself if it is not one.
#[must_use]
pub fn unwrap(sink: &Arc<dyn EventSink>) -> Arc<dyn EventSink> {
    match sink.as_context_sink() {
        Some(shim) => Arc::clone(shim.base()),
        None => Arc::clone(sink),
    }
}

/// Returns the snapshot carried by `sink`, if it is a shim.
#[must_use]
pub fn payload_of(sink: &dyn EventSink) -> Option<Snapshot> {
    sink.as_context_sink().map(|shim| shim.payload().clone())
}

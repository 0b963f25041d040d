//! Event sink trait and implementations.

use super::ContextSink;
use crate::carrier;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn, Level};

/// Trait for event sinks that can receive events.
///
/// This is the collaborator contract the transport shim decorates: a
/// `ContextSink` forwards every method here to the sink it wraps.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "request.started")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Tries to emit an event without blocking.
    ///
    /// This method should never panic. Errors are logged but suppressed.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Returns false if events of this type would be discarded.
    fn enabled(&self, _event_type: &str) -> bool {
        true
    }

    /// Returns the shim if this sink is one.
    fn as_context_sink(&self) -> Option<&ContextSink> {
        None
    }
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn enabled(&self, _event_type: &str) -> bool {
        false
    }
}

/// An event sink that logs events using the tracing framework.
///
/// The number of bindings in the ambient context is attached to every record.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    /// Returns the level events are logged at.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    fn log_event(&self, event_type: &str, data: Option<&serde_json::Value>) {
        let context_bindings = carrier::snapshot().len();
        macro_rules! log_at {
            ($log:ident) => {
                $log!(
                    event_type = %event_type,
                    event_data = ?data,
                    context_bindings,
                    "Event: {}", event_type
                )
            };
        }

        if self.level == Level::TRACE {
            log_at!(trace);
        } else if self.level == Level::DEBUG {
            log_at!(debug);
        } else if self.level == Level::INFO {
            log_at!(info);
        } else if self.level == Level::WARN {
            log_at!(warn);
        } else {
            log_at!(error);
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// An event recorded by `CollectingEventSink`.
#[derive(Debug, Clone)]
pub struct CollectedEvent {
    /// The event type.
    pub event_type: String,
    /// The event data.
    pub data: Option<serde_json::Value>,
    /// The ambient snapshot when the event was delivered.
    pub context: Snapshot,
}

/// A collecting event sink for testing purposes.
///
/// Records the ambient snapshot alongside each event so tests can check what
/// context a delivery ran under.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<CollectedEvent>>,
    prefix: Option<String>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that only accepts event types starting with `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            events: parking_lot::RwLock::default(),
            prefix: Some(prefix.into()),
        }
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<CollectedEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    fn record(&self, event_type: &str, data: Option<serde_json::Value>) {
        if !self.enabled(event_type) {
            return;
        }
        self.events.write().push(CollectedEvent {
            event_type: event_type.to_string(),
            data,
            context: carrier::snapshot(),
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.record(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.record(event_type, data);
    }

    fn enabled(&self, event_type: &str) -> bool {
        self.prefix
            .as_deref()
            .map_or(true, |prefix| event_type.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit("test", None).await;
        sink.try_emit("test", Some(serde_json::json!({"x": 1})));
        assert!(!sink.enabled("test"));
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingEventSink::debug();
        sink.emit("test.event", Some(serde_json::json!({"key": "value"}))).await;
        sink.try_emit("test.event", None);
        assert!(sink.enabled("anything"));
        assert!(sink.as_context_sink().is_none());
    }

    #[derive(Clone, Default)]
    struct CapturedOutput(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_logging_sink_uses_configured_level() {
        for level in [Level::TRACE, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR] {
            let output = CapturedOutput::default();
            let writer = output.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(Level::TRACE)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();

            let sink = LoggingEventSink::new(level);
            assert_eq!(sink.level(), level);
            tracing::subscriber::with_default(subscriber, || sink.try_emit("level.check", None));

            let logged = String::from_utf8(output.0.lock().clone()).unwrap();
            let line = logged
                .lines()
                .find(|line| line.contains("Event: level.check"))
                .unwrap();
            assert!(line.contains(level.as_str()), "{line}");
        }
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("event1", None).await;
        sink.try_emit("event2", Some(serde_json::json!({"data": true})));

        assert_eq!(sink.len(), 2);

        let events = sink.events();
        assert_eq!(events[0].event_type, "event1");
        assert_eq!(events[1].event_type, "event2");
        assert!(events[0].context.is_empty());
    }

    #[tokio::test]
    async fn test_collecting_sink_prefix_filter() {
        let sink = CollectingEventSink::with_prefix("request.");
        sink.emit("request.started", None).await;
        sink.emit("tool.invoked", None).await;

        assert!(sink.enabled("request.finished"));
        assert!(!sink.enabled("tool.invoked"));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_collecting_sink_clear() {
        let sink = CollectingEventSink::new();
        sink.try_emit("event", None);
        assert_eq!(sink.len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}

//! The ambient event sink.
//!
//! The base sink is stored next to the snapshot slot and resolved in the
//! same order: the current task, then the current thread, then the process
//! default. Readers always get the base rewrapped with the current snapshot,
//! so changing the sink never changes the context and vice versa. As with
//! snapshots, a runtime task spawned without the propagation hook skips the
//! worker thread's slot and cannot install a sink there.

use super::{ContextSink, EventSink, NoOpEventSink};
use crate::carrier;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

type SharedSink = Arc<dyn EventSink>;

tokio::task_local! {
    static TASK_SINK: RefCell<Option<SharedSink>>;
}

thread_local! {
    static THREAD_SINK: RefCell<Option<SharedSink>> = const { RefCell::new(None) };
}

static GLOBAL_SINK: RwLock<Option<SharedSink>> = RwLock::new(None);

/// Splits a sink into its base and, for a shim, the payload it carries.
fn split(sink: SharedSink) -> (SharedSink, Option<crate::snapshot::Snapshot>) {
    match sink.as_context_sink() {
        Some(shim) => (Arc::clone(shim.base()), Some(shim.payload().clone())),
        None => (sink, None),
    }
}

fn in_runtime_task() -> bool {
    tokio::task::try_id().is_some()
}

fn in_detached_task() -> bool {
    TASK_SINK.try_with(|_| ()).is_err() && in_runtime_task()
}

/// Returns the sink installed in the current task or thread, if any.
pub(crate) fn local_sink() -> Option<SharedSink> {
    TASK_SINK.try_with(|slot| slot.borrow().clone()).unwrap_or_else(|_| {
        if in_runtime_task() {
            None
        } else {
            THREAD_SINK.with(|slot| slot.borrow().clone())
        }
    })
}

/// Swaps the local sink, returning the displaced one.
///
/// The outer `None` means a detached task with no slot to write.
fn replace_local(next: Option<SharedSink>) -> Option<Option<SharedSink>> {
    let mut next = Some(next);
    if let Ok(previous) = TASK_SINK.try_with(|slot| slot.replace(next.take().flatten())) {
        return Some(previous);
    }
    if in_runtime_task() {
        return None;
    }
    Some(THREAD_SINK.with(|slot| slot.replace(next.take().flatten())))
}

/// Returns the base sink without any payload.
fn current_base_sink() -> SharedSink {
    local_sink()
        .or_else(|| GLOBAL_SINK.read().clone())
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}

/// Returns the ambient sink wrapped with the current snapshot.
#[must_use]
pub fn current_event_sink() -> SharedSink {
    Arc::new(ContextSink::new(current_base_sink(), carrier::snapshot()))
}

struct SinkGuard {
    previous: Option<Option<SharedSink>>,
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            replace_local(previous);
        }
    }
}

/// Runs `f` with `sink` as the ambient sink, then restores the previous one.
///
/// The current snapshot is kept unless `sink` is a `ContextSink`, in which
/// case its payload is installed for the duration of `f`.
pub fn with_event_sink<R>(sink: SharedSink, f: impl FnOnce() -> R) -> R {
    let (base, payload) = split(sink);
    let run = move || match payload {
        Some(payload) => carrier::with_snapshot(&payload, f),
        None => f(),
    };
    if in_detached_task() {
        return scope_sync(Some(base), run);
    }
    let _guard = SinkGuard {
        previous: replace_local(Some(base)),
    };
    run()
}

/// Runs `fut` with `sink` as the ambient sink.
///
/// Like `with_context_async`, the snapshot is resolved when this function is
/// called.
pub fn with_event_sink_async<F: Future>(
    sink: SharedSink,
    fut: F,
) -> impl Future<Output = F::Output> {
    let (base, payload) = split(sink);
    let payload = payload.unwrap_or_else(carrier::snapshot);
    scope_future(Some(base), carrier::scoped_install_async(payload, fut))
}

/// Installs `sink` in the current task or thread without restoring it.
///
/// Outside any runtime task this applies to the current thread. In a task
/// spawned without `spawn` or `propagate` the call is ignored with a warning;
/// use `with_event_sink` there instead.
pub fn set_event_sink(sink: SharedSink) {
    let (base, _) = split(sink);
    if replace_local(Some(base)).is_none() {
        warn!("Ignoring set_event_sink in a task spawned without context propagation");
    }
}

/// Removes the sink installed in the current task or thread.
pub fn clear_event_sink() {
    if replace_local(None).is_none() {
        warn!("Ignoring clear_event_sink in a task spawned without context propagation");
    }
}

/// Sets the process-wide default sink used when no task or thread has one.
pub fn set_global_event_sink(sink: SharedSink) {
    let (base, _) = split(sink);
    debug!("Setting global event sink");
    *GLOBAL_SINK.write() = Some(base);
}

/// Removes the process-wide default sink.
pub fn clear_global_event_sink() {
    *GLOBAL_SINK.write() = None;
}

/// Emits through the ambient sink without blocking.
///
/// Does nothing if the sink is not interested in `event_type`.
pub fn try_emit_event(event_type: &str, data: Option<serde_json::Value>) {
    let sink = current_event_sink();
    if sink.enabled(event_type) {
        sink.try_emit(event_type, data);
    }
}

/// Emits through the ambient sink.
pub async fn emit_event(event_type: &str, data: Option<serde_json::Value>) {
    let sink = current_event_sink();
    if sink.enabled(event_type) {
        sink.emit(event_type, data).await;
    }
}

/// Runs `fut` with its own sink slot initialised to `sink`.
pub(crate) fn scope_future<F: Future>(
    sink: Option<SharedSink>,
    fut: F,
) -> impl Future<Output = F::Output> {
    TASK_SINK.scope(RefCell::new(sink), fut)
}

/// Runs `f` with its own sink slot initialised to `sink`.
pub(crate) fn scope_sync<R>(sink: Option<SharedSink>, f: impl FnOnce() -> R) -> R {
    TASK_SINK.sync_scope(RefCell::new(sink), f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{Bindings, IntoContext};
    use crate::events::{payload_of, wrap_with, CollectingEventSink};
    use crate::identity::ContextVar;
    use crate::snapshot::Snapshot;

    fn var() -> ContextVar<i64> {
        ContextVar::builder("attempt").declare_local().unwrap()
    }

    #[test]
    fn test_current_sink_is_always_wrapped() {
        let sink = current_event_sink();
        let payload = payload_of(sink.as_ref()).unwrap();
        assert!(payload.is_empty());
        try_emit_event("nobody.listening", None);
    }

    #[test]
    fn test_global_sink_is_last_resort() {
        let global = Arc::new(CollectingEventSink::with_prefix("global_fallback."));
        set_global_event_sink(global.clone());

        try_emit_event("global_fallback.ping", None);
        let local = Arc::new(CollectingEventSink::new());
        with_event_sink(local.clone(), || try_emit_event("global_fallback.pong", None));

        clear_global_event_sink();
        try_emit_event("global_fallback.after", None);

        let seen: Vec<_> = global.events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(seen, vec!["global_fallback.ping".to_string()]);
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn test_payload_tracks_latest_install() {
        let v = var();
        carrier::with_bindings(&Bindings::new().set(&v, 1_i64), || {
            let payload = payload_of(current_event_sink().as_ref()).unwrap();
            assert_eq!(v.get_in(&payload), Some(1));

            carrier::with_bindings(&Bindings::new().set(&v, 2_i64), || {
                let payload = payload_of(current_event_sink().as_ref()).unwrap();
                assert_eq!(v.get_in(&payload), Some(2));
            });
        });
        let payload = payload_of(current_event_sink().as_ref()).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_replacing_base_keeps_payload() {
        let v = var();
        let collector = Arc::new(CollectingEventSink::new());

        carrier::with_bindings(&Bindings::new().set(&v, 7_i64), || {
            with_event_sink(collector.clone(), || {
                assert_eq!(v.get(), Some(7));
                try_emit_event("step.started", None);
            });
        });

        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(v.get_in(&events[0].context), Some(7));
    }

    #[test]
    fn test_shim_payload_overrides() {
        let v = var();
        let collector = Arc::new(CollectingEventSink::new());
        let carried = Bindings::new().set(&v, 3_i64).into_snapshot(&Snapshot::empty());

        carrier::with_bindings(&Bindings::new().set(&v, 9_i64), || {
            with_event_sink(wrap_with(collector.clone(), carried), || {
                assert_eq!(v.get(), Some(3));
                try_emit_event("step.started", None);
            });
            assert_eq!(v.get(), Some(9));
        });

        assert_eq!(v.get_in(&collector.events()[0].context), Some(3));
    }

    #[test]
    fn test_inner_sink_does_not_discard_outer_payload() {
        let v = var();
        let outer = Arc::new(CollectingEventSink::new());
        let inner = Arc::new(CollectingEventSink::new());

        carrier::with_bindings(&Bindings::new().set(&v, 5_i64), || {
            with_event_sink(outer.clone(), || {
                with_event_sink(inner.clone(), || try_emit_event("inner", None));
                try_emit_event("outer", None);
            });
        });

        assert_eq!(v.get_in(&inner.events()[0].context), Some(5));
        assert_eq!(v.get_in(&outer.events()[0].context), Some(5));
    }

    #[test]
    fn test_sink_restored_after_scope() {
        let collector = Arc::new(CollectingEventSink::new());
        with_event_sink(collector.clone(), || try_emit_event("inside", None));
        try_emit_event("outside", None);
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_set_and_clear_event_sink() {
        let collector = Arc::new(CollectingEventSink::new());
        set_event_sink(collector.clone());
        try_emit_event("first", None);
        clear_event_sink();
        try_emit_event("second", None);

        assert_eq!(collector.len(), 1);
        assert!(local_sink().is_none());
    }

    #[test]
    fn test_disabled_events_are_skipped() {
        let collector = Arc::new(CollectingEventSink::with_prefix("tool."));
        with_event_sink(collector.clone(), || {
            try_emit_event("tool.invoked", None);
            try_emit_event("request.started", None);
        });
        assert_eq!(collector.len(), 1);
    }

    #[tokio::test]
    async fn test_async_sink_scope() {
        let v = var();
        let collector = Arc::new(CollectingEventSink::new());

        let fut = carrier::with_bindings(&Bindings::new().set(&v, 4_i64), || {
            with_event_sink_async(collector.clone(), async {
                tokio::task::yield_now().await;
                emit_event("async.step", None).await;
            })
        });
        fut.await;

        assert_eq!(v.get_in(&collector.events()[0].context), Some(4));
        assert!(local_sink().is_none());
    }

    #[tokio::test]
    async fn test_plain_task_cannot_install_sink_for_others() {
        let collector = Arc::new(CollectingEventSink::with_prefix("plain_task."));

        let installer = collector.clone();
        tokio::spawn(async move {
            set_event_sink(installer);
            assert!(local_sink().is_none());
        })
        .await
        .unwrap();

        tokio::spawn(async { try_emit_event("plain_task.other", None) })
            .await
            .unwrap();
        try_emit_event("plain_task.caller", None);

        assert!(collector.is_empty());
        assert!(local_sink().is_none());
    }

    #[tokio::test]
    async fn test_scoped_sink_works_in_plain_task() {
        let collector = Arc::new(CollectingEventSink::with_prefix("plain_scope."));

        let scoped = collector.clone();
        let after = tokio::spawn(async move {
            with_event_sink(scoped, || try_emit_event("plain_scope.inside", None));
            local_sink().is_none()
        })
        .await
        .unwrap();

        assert!(after);
        assert_eq!(collector.len(), 1);
        assert!(local_sink().is_none());
    }
}

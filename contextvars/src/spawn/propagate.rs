//! Capturing the current context for newly created tasks.

use crate::carrier;
use crate::events::{self, EventSink};
use crate::snapshot::Snapshot;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::trace;

/// The snapshot and sink of the spawning task, taken at creation time.
struct Captured {
    snapshot: Snapshot,
    sink: Option<Arc<dyn EventSink>>,
}

impl Captured {
    fn now() -> Self {
        let snapshot = carrier::snapshot();
        trace!(bindings = snapshot.len(), "Capturing context for new task");
        Self {
            snapshot,
            sink: events::local_sink(),
        }
    }

    fn scope<F: Future>(self, fut: F) -> impl Future<Output = F::Output> {
        events::scope_future(
            self.sink,
            carrier::scoped_install_async(self.snapshot, fut),
        )
    }

    fn run<R>(self, f: impl FnOnce() -> R) -> R {
        let snapshot = self.snapshot;
        events::scope_sync(self.sink, move || carrier::scope_sync(snapshot, f))
    }
}

/// Binds `fut` to the current context.
///
/// The snapshot and ambient sink are read now, not when the future is first
/// polled. The returned future owns its own slots, so rebinding inside it is
/// invisible to the caller and later rebinding by the caller is invisible to
/// it. Wrap every future handed to an executor with this.
pub fn on_task_spawn<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    Captured::now().scope(fut)
}

/// Alias for [`on_task_spawn`].
pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    on_task_spawn(fut)
}

/// Spawns `fut` on the tokio runtime with the current context.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(on_task_spawn(fut))
}

/// Runs `f` on tokio's blocking pool with the current context.
pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let captured = Captured::now();
    tokio::task::spawn_blocking(move || captured.run(f))
}

/// Runs `f` on a new OS thread with the current context.
pub fn spawn_thread<F, R>(f: F) -> std::thread::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let captured = Captured::now();
    std::thread::spawn(move || captured.run(f))
}

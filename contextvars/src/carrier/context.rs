//! Scoping entry points over the current task's carrier slot.

use super::scope::{scoped_install, scoped_install_async};
use super::slot;
use super::{Bindings, EmptyContext, IntoContext};
use crate::snapshot::Snapshot;
use std::future::Future;
use tracing::{trace, warn};

/// Returns the snapshot installed in the current task.
#[must_use]
pub fn snapshot() -> Snapshot {
    slot::current()
}

/// Runs `f` with the context produced by `ctx`, then restores the current one.
pub fn with_context<C: IntoContext, R>(ctx: C, f: impl FnOnce() -> R) -> R {
    let next = ctx.into_snapshot(&slot::current());
    scoped_install(next, f)
}

/// Runs `fut` with the context produced by `ctx`.
///
/// The context is resolved against the current snapshot when this function
/// is called, not when the future is first polled.
pub fn with_context_async<C: IntoContext, F: Future>(
    ctx: C,
    fut: F,
) -> impl Future<Output = F::Output> {
    let next = ctx.into_snapshot(&slot::current());
    scoped_install_async(next, fut)
}

/// Runs `f` with `bindings` merged over the current context.
///
/// An empty binding list installs the current snapshot itself.
pub fn with_bindings<R>(bindings: &Bindings, f: impl FnOnce() -> R) -> R {
    with_context(bindings, f)
}

/// Runs `fut` with `bindings` merged over the current context.
pub fn with_bindings_async<F: Future>(
    bindings: &Bindings,
    fut: F,
) -> impl Future<Output = F::Output> {
    scoped_install_async(bindings.into_snapshot(&slot::current()), fut)
}

/// Runs `f` with no bindings at all.
pub fn with_empty_context<R>(f: impl FnOnce() -> R) -> R {
    with_context(EmptyContext, f)
}

/// Runs `fut` with no bindings at all.
pub fn with_empty_context_async<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    with_context_async(EmptyContext, fut)
}

/// Runs `f` with a previously captured snapshot reinstalled.
pub fn with_snapshot<R>(snapshot: &Snapshot, f: impl FnOnce() -> R) -> R {
    with_context(snapshot, f)
}

/// Runs `fut` with a previously captured snapshot reinstalled.
pub fn with_snapshot_async<F: Future>(
    snapshot: &Snapshot,
    fut: F,
) -> impl Future<Output = F::Output> {
    scoped_install_async(snapshot.clone(), fut)
}

/// Merges `bindings` into the current context without any rollback.
///
/// Inside a scoped call the change lasts until that scope exits. Outside any
/// runtime task it applies to the current thread. In a task spawned without
/// `spawn` or `propagate` there is no slot to write, so the change is dropped
/// with a warning.
pub fn batch_set(bindings: &Bindings) {
    if bindings.is_empty() {
        return;
    }
    let next = slot::current().apply(bindings.ops());
    let bindings_after = next.len();
    if slot::replace(next).is_none() {
        warn!(
            ops = bindings.len(),
            "Ignoring batch_set in a task spawned without context propagation"
        );
        return;
    }
    trace!(
        ops = bindings.len(),
        bindings = bindings_after,
        task_slot = slot::in_task_slot(),
        "Batch-set context"
    );
}

/// Replaces the current context with `snapshot` and returns the old one.
///
/// Unlike `with_snapshot`, nothing is restored automatically. In a task
/// spawned without `spawn` or `propagate` nothing is replaced and the empty
/// snapshot is returned.
pub fn restore_to(snapshot: Snapshot) -> Snapshot {
    slot::replace(snapshot).unwrap_or_else(|| {
        warn!("Ignoring restore_to in a task spawned without context propagation");
        Snapshot::empty()
    })
}

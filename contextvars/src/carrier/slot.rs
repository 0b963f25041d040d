//! Per-task storage of the current snapshot.
//!
//! Tasks entered through this crate keep their snapshot in a tokio task-local
//! owned by the task's future, so it moves with the task between worker
//! threads. Code running outside any runtime task uses a per-thread fallback
//! slot.
//!
//! A runtime task spawned without the propagation hook is detached: it reads
//! the empty context and cannot write, since the worker thread's fallback
//! slot is shared by every task polled on it.

use crate::snapshot::Snapshot;
use std::cell::RefCell;
use std::future::Future;

tokio::task_local! {
    static TASK_SLOT: RefCell<Snapshot>;
}

thread_local! {
    static THREAD_SLOT: RefCell<Snapshot> = const { RefCell::new(Snapshot::EMPTY) };
}

/// Returns the snapshot installed in the current task or thread.
pub(crate) fn current() -> Snapshot {
    TASK_SLOT.try_with(|slot| slot.borrow().clone()).unwrap_or_else(|_| {
        if in_runtime_task() {
            Snapshot::EMPTY
        } else {
            THREAD_SLOT.with(|slot| slot.borrow().clone())
        }
    })
}

/// Installs `next` in the current slot and returns the displaced snapshot.
///
/// Returns `None` in a detached task, which has no slot to write.
pub(crate) fn replace(next: Snapshot) -> Option<Snapshot> {
    let mut next = Some(next);
    if let Ok(previous) = TASK_SLOT.try_with(|slot| slot.replace(next.take().unwrap_or_default())) {
        return Some(previous);
    }
    if in_runtime_task() {
        return None;
    }
    Some(THREAD_SLOT.with(|slot| slot.replace(next.take().unwrap_or_default())))
}

/// Returns true when running inside a task-local slot.
pub(crate) fn in_task_slot() -> bool {
    TASK_SLOT.try_with(|_| ()).is_ok()
}

/// Returns true inside a runtime task that has no slot of its own.
pub(crate) fn in_detached_task() -> bool {
    !in_task_slot() && in_runtime_task()
}

/// Returns true while a runtime task is being polled.
///
/// `block_on` futures are not tasks, so they keep the thread slot.
fn in_runtime_task() -> bool {
    tokio::task::try_id().is_some()
}

/// Runs `fut` with its own slot initialised to `snapshot`.
///
/// The slot lives inside the returned future and is dropped with it.
pub(crate) fn scope_future<F: Future>(
    snapshot: Snapshot,
    fut: F,
) -> impl Future<Output = F::Output> {
    TASK_SLOT.scope(RefCell::new(snapshot), fut)
}

/// Runs `f` with its own slot initialised to `snapshot`.
pub(crate) fn scope_sync<R>(snapshot: Snapshot, f: impl FnOnce() -> R) -> R {
    TASK_SLOT.sync_scope(RefCell::new(snapshot), f)
}

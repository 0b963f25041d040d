//! Scoped installation of snapshots.

use super::slot;
use crate::snapshot::Snapshot;
use std::future::Future;
use tracing::trace;

/// Guard that restores the previous snapshot on drop.
///
/// Lives in the caller's stack frame, so restoration runs on return, early
/// return, error propagation, and unwinding alike.
struct RestoreGuard {
    previous: Option<Snapshot>,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            trace!(bindings = previous.len(), "Restoring context snapshot");
            slot::replace(previous);
        }
    }
}

/// Installs `snapshot` for the duration of `f` and restores the previous one.
///
/// The callback's return value (including any `Err`) and any panic pass
/// through unchanged after restoration. In a detached task `f` runs in a slot
/// of its own, which is dropped on exit.
pub fn scoped_install<R>(snapshot: Snapshot, f: impl FnOnce() -> R) -> R {
    trace!(bindings = snapshot.len(), "Installing context snapshot");
    if slot::in_detached_task() {
        return slot::scope_sync(snapshot, f);
    }
    let _guard = RestoreGuard {
        previous: slot::replace(snapshot),
    };
    f()
}

/// Runs `fut` with `snapshot` installed.
///
/// The future gets its own slot, so the caller's slot is never touched:
/// suspension, resumption on another worker, and cancellation by dropping
/// the future all leave the caller's context as it was.
pub fn scoped_install_async<F: Future>(
    snapshot: Snapshot,
    fut: F,
) -> impl Future<Output = F::Output> {
    slot::scope_future(snapshot, fut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::VariableKey;
    use crate::snapshot::{BoundValue, MergeOp};

    fn bound() -> Snapshot {
        Snapshot::empty().apply(&[(VariableKey::random(), MergeOp::Upsert(BoundValue::new(1_u8)))])
    }

    #[test]
    fn test_restores_on_return() {
        let snapshot = bound();
        let result = scoped_install(snapshot.clone(), || {
            assert!(slot::current().ptr_eq(&snapshot));
            42
        });
        assert_eq!(result, 42);
        assert!(slot::current().is_empty());
    }

    #[test]
    fn test_restores_on_err() {
        let result: Result<(), String> =
            scoped_install(bound(), || Err("callback failed".to_string()));
        assert_eq!(result, Err("callback failed".to_string()));
        assert!(slot::current().is_empty());
    }

    #[test]
    fn test_restores_on_panic() {
        let outer = bound();
        slot::replace(outer.clone());

        let caught = std::panic::catch_unwind(|| {
            scoped_install(bound(), || panic!("boom"));
        });

        assert!(caught.is_err());
        assert!(slot::current().ptr_eq(&outer));
        slot::replace(Snapshot::empty());
    }

    #[test]
    fn test_nested_installs_unwind_in_order() {
        let first = bound();
        let second = bound();
        scoped_install(first.clone(), || {
            scoped_install(second.clone(), || {
                assert!(slot::current().ptr_eq(&second));
            });
            assert!(slot::current().ptr_eq(&first));
        });
        assert!(slot::current().is_empty());
    }

    #[tokio::test]
    async fn test_async_install_leaves_caller_slot() {
        let snapshot = bound();
        let seen = scoped_install_async(snapshot.clone(), async { slot::current() }).await;
        assert!(seen.ptr_eq(&snapshot));
        assert!(slot::current().is_empty());
    }

    #[tokio::test]
    async fn test_sync_install_in_detached_task_uses_own_slot() {
        let snapshot = bound();
        let (inside, after) = tokio::spawn({
            let snapshot = snapshot.clone();
            async move {
                let inside = scoped_install(snapshot, slot::current);
                (inside, slot::current())
            }
        })
        .await
        .unwrap();

        assert!(inside.ptr_eq(&snapshot));
        assert!(after.is_empty());
        assert!(slot::current().is_empty());
    }
}

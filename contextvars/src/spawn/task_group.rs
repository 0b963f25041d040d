//! Structured group of tasks that inherit the spawning context.

use super::propagate::spawn;
use crate::errors::TaskGroupError;
use parking_lot::RwLock;
use std::any::Any;
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// A group of related tasks spawned with the caller's context.
///
/// Each task captures the snapshot and sink current at its `spawn` call. If
/// any task fails, the remaining ones are aborted. Aborted tasks drop their
/// own slots with their futures, so no context outlives them.
pub struct ContextTaskGroup {
    /// Named handles to spawned tasks.
    handles: RwLock<Vec<(String, JoinHandle<anyhow::Result<()>>)>>,
    /// Why the group was cancelled, if it was.
    cancel_reason: RwLock<Option<String>>,
    /// The first error encountered.
    first_error: RwLock<Option<TaskGroupError>>,
}

impl ContextTaskGroup {
    /// Creates a new task group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(Vec::new()),
            cancel_reason: RwLock::new(None),
            first_error: RwLock::new(None),
        }
    }

    /// Spawns a task in the group with the current context.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        debug!(task = %name, "Spawning task in group");
        let handle = spawn(task);
        self.handles.write().push((name, handle));
    }

    /// Aborts all pending tasks in the group.
    pub fn cancel_all(&self, reason: &str) {
        info!(reason, "Cancelling task group");
        self.cancel_reason
            .write()
            .get_or_insert_with(|| reason.to_string());
        for (_, handle) in self.handles.read().iter() {
            handle.abort();
        }
    }

    /// Returns true if `cancel_all` was called or a task failed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.read().is_some()
    }

    /// Waits for all tasks to complete.
    ///
    /// If any task fails, remaining tasks are aborted.
    /// Returns the first error if any occurred.
    pub async fn wait(&self) -> Result<(), TaskGroupError> {
        let handles = std::mem::take(&mut *self.handles.write());
        let mut pending = handles.into_iter();

        while let Some((name, handle)) = pending.next() {
            let error = match handle.await {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => TaskGroupError::Failed {
                    name,
                    message: format!("{err:#}"),
                },
                Err(join_error) => self.join_failure(name, join_error),
            };

            warn!(task = error.task_name(), error = %error, "Task in group did not complete");
            let mut first_error = self.first_error.write();
            if first_error.is_none() {
                self.cancel_reason
                    .write()
                    .get_or_insert_with(|| format!("task '{}' did not complete", error.task_name()));
                for (_, remaining) in pending.as_slice() {
                    remaining.abort();
                }
                *first_error = Some(error);
            }
        }

        match self.first_error.read().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Returns the number of pending tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.read().len()
    }

    fn join_failure(&self, name: String, join_error: JoinError) -> TaskGroupError {
        match join_error.try_into_panic() {
            Ok(payload) => TaskGroupError::Panicked {
                name,
                message: panic_message(payload.as_ref()),
            },
            Err(_) => TaskGroupError::Cancelled {
                name,
                reason: self
                    .cancel_reason
                    .read()
                    .clone()
                    .unwrap_or_else(|| "aborted".to_string()),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Default for ContextTaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextTaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextTaskGroup")
            .field("task_count", &self.task_count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

//! Worker pool executing per-detection actions.

use crate::detection::Detection;
use crate::error::Result;
use crate::processor::actions::Action;
use crossbeam_channel::Receiver;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Kinds of work carried on the task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskKind {
    /// Execute one action for one confirmed detection.
    Action,
}

/// One unit of work for the pool: a confirmed detection and a single action.
#[derive(Debug)]
pub(crate) struct Task {
    pub kind: TaskKind,
    pub detection: Arc<Detection>,
    pub action: Action,
}

/// Spawn `count` workers consuming the bounded task channel.
///
/// Workers exit when the channel closes; in-flight tasks finish first.
///
/// # Errors
///
/// Returns an error if a worker thread cannot be spawned.
pub(crate) fn spawn_worker_pool(count: usize, tasks: &Receiver<Task>) -> Result<Vec<JoinHandle<()>>> {
    let mut workers = Vec::with_capacity(count);
    for i in 0..count {
        let rx = tasks.clone();
        let handle = thread::Builder::new()
            .name(format!("action-worker-{i}"))
            .spawn(move || worker_loop(&rx))?;
        workers.push(handle);
    }
    Ok(workers)
}

/// Dequeue and execute tasks until the channel closes.
///
/// Panics inside an action are caught and logged; the worker survives and
/// keeps consuming.
fn worker_loop(tasks: &Receiver<Task>) {
    for task in tasks.iter() {
        let TaskKind::Action = task.kind;

        let outcome = catch_unwind(AssertUnwindSafe(|| task.action.execute(&task.detection)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(
                    "Action {} failed for {}: {e}",
                    task.action.name(),
                    task.detection.note.common_name
                );
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    "Action {} panicked for {}: {message}",
                    task.action.name(),
                    task.detection.note.common_name
                );
            }
        }
    }
    debug!("task channel closed, worker exiting");
}

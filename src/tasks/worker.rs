//! # Task Worker: runs one job and guarantees its terminal event.
//!
//! [`spawn`] starts a job on its own tokio task, independent of the
//! dispatcher's poll cadence. The worker publishes to the [`Bus`] only —
//! never to a socket.
//!
//! ## Rules
//! - **Exactly one terminal event per spawn**, whatever happens:
//!   - `Ok(data)` → `result`
//!   - `Err(_)` (including cancellation) → `failed`
//!   - panic (caught at the worker boundary) → `failed`
//! - Nothing is published for an id after its terminal event; the job's
//!   [`Reporter`](super::Reporter) dies with the job future.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::TaskError;
use crate::events::{Bus, TaskEvent};
use crate::tasks::job::{JobRef, Reporter};

/// Handle to a running worker, owned by the registry for its lifetime.
pub struct WorkerHandle {
    join: JoinHandle<()>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    /// Requests cooperative cancellation of the job.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the worker task has exited (its terminal event is on the bus).
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub(crate) fn into_join(self) -> JoinHandle<()> {
        self.join
    }
}

/// Starts `job` under task id `id` on its own tokio task.
///
/// The worker's cancellation token is a child of `parent`, so runtime
/// shutdown propagates to every in-flight job.
pub fn spawn(id: String, job: JobRef, bus: Bus, parent: &CancellationToken) -> WorkerHandle {
    let cancel = parent.child_token();
    let ctx = cancel.clone();

    let join = tokio::spawn(async move {
        let reporter = Reporter::new(id.clone(), bus.clone());
        let outcome = AssertUnwindSafe(job.run(reporter, ctx)).catch_unwind().await;

        let terminal = match outcome {
            Ok(Ok(data)) => {
                info!(task = %id, "task completed");
                TaskEvent::completed(id.as_str(), data)
            }
            Ok(Err(e)) => {
                warn!(task = %id, label = e.as_label(), error = %e, "task failed");
                TaskEvent::failed(id.as_str(), e.to_string())
            }
            Err(_panic) => {
                error!(task = %id, "task panicked");
                TaskEvent::failed(id.as_str(), TaskError::Panicked.to_string())
            }
        };
        bus.publish(terminal);
    });

    WorkerHandle { join, cancel }
}

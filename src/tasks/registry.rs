//! # Task Registry: in-flight task map with event-driven cleanup.
//!
//! The registry is the exclusive owner of each [`WorkerHandle`] for its
//! running lifetime. Its listener subscribes to the [`Bus`] and removes the
//! entry when the terminal event for an id is observed, which is the task's
//! destruction point — no id is ever resurrected.
//!
//! ```text
//! Bus ──► Registry listener
//!           ├─► result / failed ──► remove(id) ──► join worker
//!           └─► progress ─────────► ignored
//! ```
//!
//! ## Rules
//! - The map is guarded by an async `RwLock`; registration (dispatcher) and
//!   removal (listener) for distinct ids never interfere.
//! - Registry size equals the number of tasks whose terminal event has not
//!   yet been observed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::events::Bus;
use crate::tasks::worker::WorkerHandle;

/// In-flight task map, shared between the dispatcher and the cleanup listener.
pub struct Registry {
    workers: RwLock<HashMap<String, WorkerHandle>>,
    bus: Bus,
}

impl Registry {
    /// Creates a new registry listening on `bus`.
    pub fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            workers: RwLock::new(HashMap::new()),
            bus,
        })
    }

    /// Spawns the cleanup listener. Call once during server init.
    ///
    /// The listener runs until `token` is cancelled or the bus closes. On lag
    /// it sweeps finished workers so missed terminal events cannot leak
    /// entries.
    pub fn spawn_listener(self: Arc<Self>, token: CancellationToken) {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                // Biased toward the receiver: terminal events already on the
                // bus when the token fires still remove their entries.
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) if ev.is_terminal() => self.finish(ev.id()).await,
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "registry listener lagged; sweeping finished workers");
                            self.sweep_finished().await;
                        }
                    },
                    _ = token.cancelled() => break,
                }
            }
        });
    }

    /// Registers a started worker under its id.
    ///
    /// Returns false (and keeps the existing entry) if the id is already
    /// registered; the dispatcher never reuses a live id, so this indicates
    /// a bug upstream.
    pub async fn insert(&self, id: String, handle: WorkerHandle) -> bool {
        let mut workers = self.workers.write().await;
        if workers.contains_key(&id) {
            error!(task = %id, "refusing to register duplicate task id");
            return false;
        }
        workers.insert(id, handle);
        true
    }

    /// True while `id` has not reached its terminal event.
    pub async fn contains(&self, id: &str) -> bool {
        self.workers.read().await.contains_key(id)
    }

    /// Number of in-flight tasks.
    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    /// True when no task is in flight.
    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    /// Sorted ids of in-flight tasks.
    pub async fn list(&self) -> Vec<String> {
        let workers = self.workers.read().await;
        let mut ids: Vec<String> = workers.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Cancels every in-flight worker and joins them: used when the shutdown
    /// grace period runs out.
    pub async fn cancel_all(&self) {
        let handles: Vec<(String, WorkerHandle)> = {
            let mut workers = self.workers.write().await;
            workers.drain().collect()
        };

        for (_, handle) in &handles {
            handle.cancel();
        }
        for (id, handle) in handles {
            join_and_report(&id, handle.into_join()).await;
        }
    }

    /// Removes `id` on its terminal event and joins the worker.
    async fn finish(&self, id: &str) {
        let handle = {
            let mut workers = self.workers.write().await;
            workers.remove(id)
        };
        match handle {
            Some(handle) => join_and_report(id, handle.into_join()).await,
            // A terminal event for an unknown id: already cleaned up (e.g.
            // by a lag sweep), or published by an embedder outside the
            // registry's view.
            None => debug!(task = %id, "terminal event for unregistered task"),
        }
    }

    /// Drops entries whose worker task already exited. Only used after the
    /// listener lagged and may have missed terminal events.
    async fn sweep_finished(&self) {
        let mut workers = self.workers.write().await;
        workers.retain(|id, handle| {
            let finished = handle.is_finished();
            if finished {
                debug!(task = %id, "swept finished worker");
            }
            !finished
        });
    }
}

async fn join_and_report(id: &str, join: JoinHandle<()>) {
    if let Err(e) = join.await {
        error!(task = %id, error = %e, "worker task did not exit cleanly");
    }
}

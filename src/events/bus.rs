//! # Event bus: the worker-to-relay marshaling point.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets any
//! number of workers publish [`TaskEvent`]s without touching the network.
//!
//! ```text
//! Publishers (many):                 Consumers:
//!   Worker 1 ──┐
//!   Worker 2 ──┼──────► Bus ───┬───► relay (owns the publish socket)
//!   Worker N ──┘  (broadcast)  └───► registry listener (terminal cleanup)
//! ```
//!
//! This is the only point of shared mutable state between workers and the
//! control path: a publish-socket write is not safe to perform from many
//! tasks, so every event is funneled here and a single relay drains it.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or awaits.
//! - **Bounded capacity**: one ring buffer shared by all receivers; slow
//!   receivers observe `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events sent with no receivers are dropped.

use tokio::sync::broadcast;

use super::event::TaskEvent;

/// Broadcast channel for task events.
///
/// Cheap to clone (the sender is `Arc`-backed); publishing is fire-and-forget.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<TaskEvent>,
}

impl Bus {
    /// Creates a new bus with the given ring-buffer capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers the event is dropped; the call still returns
    /// immediately.
    pub fn publish(&self, ev: TaskEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver observing events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_receivers_is_a_noop() {
        let bus = Bus::new(8);
        bus.publish(TaskEvent::progress("x", 10, "m"));
    }

    #[tokio::test]
    async fn receivers_see_events_in_order() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(TaskEvent::progress("x", 20, "a"));
        bus.publish(TaskEvent::completed("x", "done"));

        assert_eq!(rx.recv().await.unwrap(), TaskEvent::progress("x", 20, "a"));
        assert_eq!(rx.recv().await.unwrap(), TaskEvent::completed("x", "done"));
    }
}

//! # Event Bus Adapter: best-effort publish/subscribe fan-out.
//!
//! [`EventPublisher`] owns the event endpoint. Subscribers connect and
//! silently receive frames of the form `"<topic> <json>\n"`; they are never
//! read from.
//!
//! ## Rules
//! - **Single writer**: only one task may own the publisher (it is `!Clone`
//!   and `publish` takes `&mut self`), so frames from all workers are
//!   serialized through one writer.
//! - **Best effort**: a subscriber whose write fails or stalls past
//!   [`WRITE_TIMEOUT`] is dropped and logged; zero subscribers is normal,
//!   not an error. `publish` never waits on any one subscriber longer than
//!   the deadline.
//! - New connections are queued by the accept loop and picked up at the next
//!   publish, keeping the subscriber set single-owner as well.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::RuntimeError;
use crate::events::TaskEvent;

/// Pending-registration queue depth; connects beyond it wait in the kernel.
const REGISTRATION_QUEUE: usize = 32;

/// Per-subscriber write deadline. A subscriber that cannot absorb a frame
/// within this window (kernel buffers full because it stopped reading) is
/// treated like a failed write and dropped.
const WRITE_TIMEOUT: Duration = Duration::from_millis(250);

/// Exclusive owner of the event endpoint.
pub struct EventPublisher {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<OwnedWriteHalf>,
    sinks: Vec<OwnedWriteHalf>,
}

impl EventPublisher {
    /// Binds the event endpoint and starts accepting subscribers.
    ///
    /// Bind failure is fatal at startup. The accept loop stops when `token`
    /// is cancelled.
    pub async fn bind(addr: SocketAddr, token: CancellationToken) -> Result<Self, RuntimeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RuntimeError::Bind {
                role: "event",
                addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| RuntimeError::Bind {
            role: "event",
            addr,
            source,
        })?;

        let (tx, incoming) = mpsc::channel(REGISTRATION_QUEUE);
        tokio::spawn(accept_loop(listener, tx, token));

        Ok(Self {
            local_addr,
            incoming,
            sinks: Vec::new(),
        })
    }

    /// The address the endpoint is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently registered subscribers (after the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }

    /// Writes one frame to every subscriber, dropping those whose write
    /// fails or exceeds [`WRITE_TIMEOUT`]. Errors only on payload encoding,
    /// never on delivery.
    pub async fn publish(&mut self, ev: &TaskEvent) -> Result<(), RuntimeError> {
        let mut frame = ev.to_frame()?.into_bytes();
        frame.push(b'\n');

        self.drain_registrations();
        if self.sinks.is_empty() {
            trace!(topic = ev.topic(), "no event subscribers");
            return Ok(());
        }

        let mut alive = Vec::with_capacity(self.sinks.len());
        for mut sink in self.sinks.drain(..) {
            match tokio::time::timeout(WRITE_TIMEOUT, sink.write_all(&frame)).await {
                Ok(Ok(())) => alive.push(sink),
                Ok(Err(e)) => debug!(error = %e, "dropping event subscriber"),
                Err(_) => {
                    warn!(deadline = ?WRITE_TIMEOUT, "dropping stalled event subscriber")
                }
            }
        }
        self.sinks = alive;
        Ok(())
    }

    fn drain_registrations(&mut self) {
        loop {
            match self.incoming.try_recv() {
                Ok(sink) => self.sinks.push(sink),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<OwnedWriteHalf>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    debug!(%peer, "event subscriber connected");
                    // Subscribers are silent; the read half is dropped.
                    let (_, write_half) = stream.into_split();
                    if tx.send(write_half).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "event accept failed"),
            }
        }
    }
}

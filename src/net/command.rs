//! # Command Channel Adapter: lock-step request/reply intake.
//!
//! [`CommandChannel`] owns the command endpoint. Each client connection
//! speaks a line-delimited protocol: one UTF-8 request line, one JSON reply
//! line, strictly alternating — the connection task will not read a second
//! request before the reply to the first has been written.
//!
//! ```text
//! client ──"hello\n"──► connection task ──PendingCommand──► mpsc ──► poll()
//! client ◄─ack json─── connection task ◄────oneshot◄────────────── reply()
//! ```
//!
//! ## Rules
//! - `poll()` is non-blocking and never yields a second command while one is
//!   unanswered ([`ProtocolError::ReplyPending`] otherwise — fatal, the
//!   caller broke lock-step).
//! - `reply()` must follow each successful poll exactly once.
//! - A client that disconnects before its reply is absorbed and logged; it is
//!   never surfaced to the dispatcher.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ProtocolError, RuntimeError};
use crate::events::Ack;

/// Intake queue depth. Commands beyond this wait in their connection task,
/// which preserves per-connection lock-step either way.
const INTAKE_QUEUE: usize = 32;

/// One received command, holding the reply path back to its connection.
#[derive(Debug)]
pub struct PendingCommand {
    text: String,
    reply_tx: oneshot::Sender<String>,
}

impl PendingCommand {
    /// The raw command payload as received.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Exclusive owner of the command endpoint.
pub struct CommandChannel {
    local_addr: SocketAddr,
    rx: mpsc::Receiver<PendingCommand>,
    outstanding: bool,
}

impl CommandChannel {
    /// Binds the command endpoint and starts accepting connections.
    ///
    /// Bind failure is fatal at startup. The accept loop and all connection
    /// tasks stop when `token` is cancelled.
    pub async fn bind(addr: SocketAddr, token: CancellationToken) -> Result<Self, RuntimeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RuntimeError::Bind {
                role: "command",
                addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| RuntimeError::Bind {
            role: "command",
            addr,
            source,
        })?;

        let (tx, rx) = mpsc::channel(INTAKE_QUEUE);
        tokio::spawn(accept_loop(listener, tx, token));

        Ok(Self {
            local_addr,
            rx,
            outstanding: false,
        })
    }

    /// The address the endpoint is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a pending command if one is waiting; never blocks.
    ///
    /// Errors with [`ProtocolError::ReplyPending`] if the previous command
    /// has not been answered, and [`RuntimeError::ChannelClosed`] if the
    /// accept loop is gone.
    pub fn poll(&mut self) -> Result<Option<PendingCommand>, RuntimeError> {
        if self.outstanding {
            return Err(ProtocolError::ReplyPending.into());
        }
        match self.rx.try_recv() {
            Ok(cmd) => {
                self.outstanding = true;
                Ok(Some(cmd))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RuntimeError::ChannelClosed),
        }
    }

    /// Sends the acknowledgement for the previously polled command.
    ///
    /// Clears the outstanding slot; a client gone before the reply lands is
    /// logged and absorbed.
    pub fn reply(&mut self, cmd: PendingCommand, ack: &Ack) -> Result<(), RuntimeError> {
        if !self.outstanding {
            return Err(ProtocolError::NoPendingRequest.into());
        }
        self.outstanding = false;

        let line = serde_json::to_string(ack)?;
        if cmd.reply_tx.send(line).is_err() {
            debug!(command = %cmd.text, "command client went away before reply");
        }
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<PendingCommand>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    debug!(%peer, "command client connected");
                    tokio::spawn(serve_connection(stream, tx.clone(), token.clone()));
                }
                Err(e) => warn!(error = %e, "command accept failed"),
            }
        }
    }
}

/// Drives one client connection in strict lock-step: read a request line,
/// hand it to the dispatcher, await the reply, write it, repeat.
async fn serve_connection(
    stream: TcpStream,
    tx: mpsc::Sender<PendingCommand>,
    token: CancellationToken,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let text = tokio::select! {
            _ = token.cancelled() => break,
            res = lines.next_line() => match res {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "command read failed");
                    break;
                }
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if tx.send(PendingCommand { text, reply_tx }).await.is_err() {
            break;
        }

        let reply = tokio::select! {
            _ = token.cancelled() => break,
            res = reply_rx => match res {
                Ok(line) => line,
                Err(_) => break,
            }
        };

        let mut frame = reply.into_bytes();
        frame.push(b'\n');
        if write_half.write_all(&frame).await.is_err() {
            break;
        }
    }
}

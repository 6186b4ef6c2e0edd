//! # taskbridge
//!
//! **taskbridge** is a local hybrid command/event server: it accepts
//! short-lived command requests over a strict request/reply TCP endpoint,
//! executes each command asynchronously as a multi-step task, and streams
//! progress and completion events over a separate publish/subscribe TCP
//! endpoint to any number of silent listeners.
//!
//! ## Architecture
//! ```text
//!  client ──req──► ┌─────────────────┐      ┌────────────────────────────┐
//!  client ◄──ack── │ CommandChannel  │◄────►│ Dispatcher (control loop)  │
//!                  │ (lock-step REQ/ │ poll │  - fresh 8-hex task id     │
//!                  │  REP over TCP)  │reply │  - spawn worker, register  │
//!                  └─────────────────┘      └──────┬─────────────────────┘
//!                                                  │ spawn
//!                  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!                  │   Worker     │   │   Worker     │   │   Worker     │
//!                  │ (one job)    │   │ (one job)    │   │ (one job)    │
//!                  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!                         │ publish          │ publish          │ publish
//!                         ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                       Bus (broadcast channel)                         │
//! └──────────────┬──────────────────────────────────┬─────────────────────┘
//!                ▼                                  ▼
//!      ┌──────────────────┐               ┌──────────────────────┐
//!      │  relay (single   │               │  Registry listener   │
//!      │  socket writer)  │               │  (terminal cleanup)  │
//!      └────────┬─────────┘               └──────────────────────┘
//!               ▼
//!      ┌─────────────────┐   "<topic> <json>\n"
//!      │ EventPublisher  │ ─────────────────────► subscribers (silent)
//!      └─────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//! command accepted ──► worker spawned ──► ack sent (status "started")
//!
//! worker:
//!   ├─► progress 20,40,...,100   (topic "progress", strictly increasing)
//!   └─► exactly one terminal event:
//!         ├─ Ok(data)        ─► topic "result"  ─► registry entry removed
//!         └─ Err / panic     ─► topic "failed"  ─► registry entry removed
//! ```
//!
//! ## Guarantees
//! - Every accepted command is acknowledged exactly once, before the next
//!   command is polled (lock-step command channel).
//! - Every started task produces exactly one terminal event — success,
//!   failure, cancellation, or panic.
//! - Per-id progress values are strictly increasing in `[0, 100]`; nothing
//!   follows the terminal event.
//! - Event delivery to subscribers is best-effort and fire-and-forget.
//!
//! ## Example
//! ```no_run
//! use taskbridge::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(Config::default()).await?;
//!     println!("commands: {}", server.command_addr());
//!     println!("events:   {}", server.event_addr());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod net;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::Server;
pub use error::{ProtocolError, RuntimeError, TaskError};
pub use events::{Ack, Bus, TaskEvent};
pub use net::{CommandChannel, EventPublisher, PendingCommand};
pub use tasks::{Analysis, Job, JobFn, JobRef, Registry, Reporter, WorkerHandle};

//! Network adapters for the two endpoints.
//!
//! Each endpoint has exactly one owning adapter:
//! - [`CommandChannel`] — lock-step request/reply intake
//! - [`EventPublisher`] — best-effort broadcast of event frames
//!
//! Workers never touch either; everything reaches the sockets through the
//! dispatcher (command side) or the relay in `core::server` (event side).

mod command;
mod publisher;

pub use command::{CommandChannel, PendingCommand};
pub use publisher::EventPublisher;

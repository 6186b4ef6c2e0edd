//! Task events: wire data model and in-process broadcast bus.
//!
//! ## Contents
//! - [`TaskEvent`], [`Ack`] — the JSON payloads crossing the two endpoints
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: workers (progress + terminal events).
//! - **Consumers**: the relay in `core::server` (writes publish frames) and
//!   the registry listener (removes finished tasks).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Ack, TaskEvent};

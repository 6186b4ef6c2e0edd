//! Runtime core: control loop and lifecycle.
//!
//! The only public API from this module is [`Server`], which binds the two
//! endpoints, runs the dispatcher, and drives graceful shutdown.
//!
//! Internal modules:
//! - [`dispatcher`]: polls the command channel and starts workers;
//! - [`server`]: assembly, event relay, shutdown with grace;
//! - [`shutdown`]: cross-platform termination signal handling.

mod dispatcher;
mod server;
mod shutdown;

pub use server::Server;

//! Error types used by the taskbridge runtime and jobs.
//!
//! This module defines three error enums:
//!
//! - [`RuntimeError`] — errors raised by the server runtime itself.
//! - [`ProtocolError`] — violations of the command channel's lock-step contract.
//! - [`TaskError`] — errors raised by individual job executions.
//!
//! All types provide `as_label` helpers returning short stable snake_case
//! strings for logs.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// # Violations of the command channel's strict request/reply ordering.
///
/// The command channel is lock-step: every poll that yields a command must be
/// answered exactly once before the next poll may yield another. Breaking the
/// order is a bug in the caller, not a recoverable transport condition, so
/// these errors are fatal to the dispatcher loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// A poll was attempted while a previously polled command was still unanswered.
    #[error("poll attempted while a reply is still pending")]
    ReplyPending,

    /// A reply was attempted with no outstanding request.
    #[error("reply attempted with no pending request")]
    NoPendingRequest,
}

/// # Errors produced by the taskbridge runtime.
///
/// These represent failures of the server itself: endpoint binds at startup,
/// channel protocol violations, and shutdown overruns.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Failed to bind a network endpoint at startup. Fatal: the process
    /// cannot serve without both endpoints.
    #[error("failed to bind {role} endpoint {addr}: {source}")]
    Bind {
        /// Which endpoint failed (`"command"` or `"event"`).
        role: &'static str,
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The command channel's lock-step contract was violated.
    #[error("command channel protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The command channel's intake queue closed while the dispatcher was
    /// still running (the accept loop died outside of shutdown).
    #[error("command channel closed unexpectedly")]
    ChannelClosed,

    /// A wire payload could not be encoded as JSON.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Shutdown grace period was exceeded; some tasks were still in flight
    /// and had to be cancelled forcibly.
    #[error("shutdown grace {grace:?} exceeded; in-flight tasks: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of tasks that did not finish in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Bind { .. } => "runtime_bind_failed",
            RuntimeError::Protocol(_) => "runtime_protocol_violation",
            RuntimeError::ChannelClosed => "runtime_channel_closed",
            RuntimeError::Encode(_) => "runtime_encode_failed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced by job execution.
///
/// A failing job still produces exactly one terminal event; these variants
/// describe what the `failed` event carries.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Job execution failed with an error message.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Job panicked; the panic was caught at the worker boundary.
    #[error("job panicked")]
    Panicked,

    /// Job was cancelled by runtime shutdown.
    #[error("task canceled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }
}

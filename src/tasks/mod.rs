//! Task abstractions: jobs, workers, and the in-flight registry.
//!
//! - [`Job`] — trait for one command's unit of async work
//! - [`JobFn`] — closure-backed job implementation
//! - [`Analysis`] — the built-in simulated analysis job
//! - [`Reporter`] — progress handle given to a running job
//! - [`spawn`] / [`WorkerHandle`] — run one job with the terminal-event guarantee
//! - [`Registry`] — owns worker handles until their terminal event

mod job;
mod registry;
mod worker;

pub use job::{Analysis, Job, JobFn, JobRef, Reporter};
pub use registry::Registry;
pub use worker::{spawn, WorkerHandle};

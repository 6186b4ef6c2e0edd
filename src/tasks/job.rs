//! # Job abstraction and the built-in simulated analysis.
//!
//! A [`Job`] is one command's unit of asynchronous work. It reports progress
//! through a [`Reporter`] and returns the result payload for the terminal
//! event. The common handle type is [`JobRef`], an `Arc<dyn Job>`.
//!
//! [`Analysis`] is the built-in job: a fixed schedule of `steps` progress
//! reports with one simulated delay unit each. It stands in for arbitrary
//! real work; any [`Job`] implementation inherits the same event contract
//! (ordered progress, exactly one terminal event — enforced by the worker).
//!
//! [`JobFn`] wraps a closure into a [`Job`], mainly for tests and embedders.

use std::borrow::Cow;
use std::future::Future;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TaskError;
use crate::events::{Bus, TaskEvent};

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// # Asynchronous, cancelable unit of work for one task.
///
/// A job receives a [`Reporter`] for progress and a [`CancellationToken`] it
/// should check between steps to stop cooperatively during shutdown.
/// `Ok(data)` becomes the `result` event; `Err` becomes the `failed` event.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Returns a stable, human-readable job name (the original command text
    /// for dispatched jobs).
    fn name(&self) -> &str;

    /// Executes the job until completion or cancellation.
    async fn run(&self, progress: Reporter, ctx: CancellationToken) -> Result<String, TaskError>;
}

/// Sentinel for "no progress published yet"; above any clamped `u8` value,
/// so the first report always passes the strictly-increasing check.
const NO_PROGRESS_YET: u16 = u16::MAX;

/// Progress handle given to a running job.
///
/// Publishes `progress` events for the job's task id. Values are clamped to
/// `[0, 100]`; after the first report, a value not strictly greater than the
/// last published one is skipped, which keeps the per-id stream strictly
/// increasing no matter what the job does. A first report of `0` is valid.
#[derive(Clone)]
pub struct Reporter {
    id: Arc<str>,
    bus: Bus,
    last: Arc<AtomicU16>,
}

impl Reporter {
    pub(crate) fn new(id: impl Into<Arc<str>>, bus: Bus) -> Self {
        Self {
            id: id.into(),
            bus,
            last: Arc::new(AtomicU16::new(NO_PROGRESS_YET)),
        }
    }

    /// Publishes one progress report.
    pub fn step(&self, value: u8, message: impl Into<String>) {
        let value = value.min(100);
        let advanced = self.last.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| {
            (prev == NO_PROGRESS_YET || u16::from(value) > prev).then_some(u16::from(value))
        });
        if let Err(prev) = advanced {
            debug!(task = %self.id, value, prev, "skipping non-increasing progress value");
            return;
        }
        self.bus
            .publish(TaskEvent::progress(self.id.as_ref(), value, message));
    }
}

/// The built-in simulated analysis job.
///
/// Fixed schedule: `steps` steps, one `step_delay` per step, progress
/// `round(step / steps * 100)`, message `"Processing step {i} of {steps}..."`.
/// The result payload is `"Analysis of '<name>' is complete."`.
pub struct Analysis {
    name: String,
    steps: u32,
    step_delay: Duration,
}

impl Analysis {
    /// Creates an analysis job for the given command payload.
    pub fn new(name: impl Into<String>, steps: u32, step_delay: Duration) -> Self {
        Self {
            name: name.into(),
            steps: steps.max(1),
            step_delay,
        }
    }
}

#[async_trait]
impl Job for Analysis {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, progress: Reporter, ctx: CancellationToken) -> Result<String, TaskError> {
        for i in 1..=self.steps {
            tokio::select! {
                _ = tokio::time::sleep(self.step_delay) => {}
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
            }
            let value = ((f64::from(i) / f64::from(self.steps)) * 100.0).round() as u8;
            progress.step(value, format!("Processing step {i} of {}...", self.steps));
        }
        Ok(format!("Analysis of '{}' is complete.", self.name))
    }
}

/// Function-backed job implementation.
///
/// Wraps a closure that creates a new future per run.
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    /// Creates a new function-backed job.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the job and returns it as a shared handle (`Arc<dyn Job>`).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn(Reporter, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, progress: Reporter, ctx: CancellationToken) -> Result<String, TaskError> {
        (self.f)(progress, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn analysis_reports_the_fixed_schedule() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let job = Analysis::new("hello", 5, Duration::from_secs(1));
        let reporter = Reporter::new("ab12cd34", bus.clone());

        let data = job
            .run(reporter, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(data, "Analysis of 'hello' is complete.");

        for expected in [20u8, 40, 60, 80, 100] {
            let ev = rx.recv().await.unwrap();
            match ev {
                TaskEvent::Progress { id, value, message } => {
                    assert_eq!(id, "ab12cd34");
                    assert_eq!(value, expected);
                    assert!(message.starts_with("Processing step "));
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_stops_on_cancellation() {
        let bus = Bus::new(16);
        let job = Analysis::new("hello", 5, Duration::from_secs(1));
        let reporter = Reporter::new("ab12cd34", bus.clone());
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = job.run(reporter, ctx).await.unwrap_err();
        assert_eq!(err, TaskError::Canceled);
    }

    #[tokio::test]
    async fn reporter_publishes_an_initial_zero_exactly_once() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reporter = Reporter::new("x", bus.clone());

        reporter.step(0, "starting");
        reporter.step(0, "again");
        reporter.step(10, "forward");

        assert_eq!(rx.recv().await.unwrap(), TaskEvent::progress("x", 0, "starting"));
        assert_eq!(rx.recv().await.unwrap(), TaskEvent::progress("x", 10, "forward"));
    }

    #[tokio::test]
    async fn reporter_skips_non_increasing_values() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reporter = Reporter::new("x", bus.clone());

        reporter.step(40, "forward");
        reporter.step(30, "backward");
        reporter.step(40, "repeat");
        reporter.step(60, "forward again");

        assert_eq!(rx.recv().await.unwrap(), TaskEvent::progress("x", 40, "forward"));
        assert_eq!(
            rx.recv().await.unwrap(),
            TaskEvent::progress("x", 60, "forward again")
        );
    }
}

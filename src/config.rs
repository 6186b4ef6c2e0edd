//! # Global runtime configuration.
//!
//! Provides [`Config`], the central settings for the server: endpoint
//! addresses, the intake poll cadence, the simulated job schedule, and
//! shutdown behavior.
//!
//! Defaults mirror the reference deployment (`127.0.0.1:5555` / `:5556`,
//! 50 ms polling, 5 steps of 1 s). [`Config::from_env`] externalizes them via
//! `TASKBRIDGE_*` variables; tests bind port 0 instead of fixed ports.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Global configuration for the server runtime.
///
/// ## Field semantics
/// - `poll_interval`: command intake cadence — a trade-off between CPU burn
///   and ack latency
/// - `steps` / `step_delay`: schedule of the built-in simulated analysis job
/// - `bus_capacity`: event bus ring buffer size (min 1, clamped by the bus)
/// - `grace`: maximum wait for in-flight tasks to finish at shutdown
#[derive(Clone, Debug)]
pub struct Config {
    /// Request/reply command endpoint.
    pub command_addr: SocketAddr,
    /// Publish/subscribe event endpoint.
    pub event_addr: SocketAddr,
    /// Command channel poll interval.
    pub poll_interval: Duration,
    /// Number of progress steps per simulated job.
    pub steps: u32,
    /// Simulated delay per step.
    pub step_delay: Duration,
    /// Capacity of the event bus broadcast ring buffer.
    pub bus_capacity: usize,
    /// Maximum wait for graceful shutdown before cancelling stragglers.
    pub grace: Duration,
}

impl Default for Config {
    /// Reference defaults:
    ///
    /// - `command_addr = 127.0.0.1:5555`
    /// - `event_addr = 127.0.0.1:5556`
    /// - `poll_interval = 50ms`
    /// - `steps = 5`, `step_delay = 1s`
    /// - `bus_capacity = 1024`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            command_addr: SocketAddr::from(([127, 0, 0, 1], 5555)),
            event_addr: SocketAddr::from(([127, 0, 0, 1], 5556)),
            poll_interval: Duration::from_millis(50),
            steps: 5,
            step_delay: Duration::from_secs(1),
            bus_capacity: 1024,
            grace: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Builds a config from `TASKBRIDGE_*` environment variables, falling
    /// back to the defaults (with a warning) for unset or invalid values.
    ///
    /// Recognized variables:
    /// - `TASKBRIDGE_COMMAND_ADDR`, `TASKBRIDGE_EVENT_ADDR` (socket addrs)
    /// - `TASKBRIDGE_POLL_INTERVAL_MS`, `TASKBRIDGE_STEP_DELAY_MS` (millis)
    /// - `TASKBRIDGE_STEPS` (count)
    /// - `TASKBRIDGE_GRACE_SECS` (seconds)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            command_addr: env_parse("TASKBRIDGE_COMMAND_ADDR", defaults.command_addr),
            event_addr: env_parse("TASKBRIDGE_EVENT_ADDR", defaults.event_addr),
            poll_interval: Duration::from_millis(env_parse(
                "TASKBRIDGE_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            steps: env_parse("TASKBRIDGE_STEPS", defaults.steps),
            step_delay: Duration::from_millis(env_parse(
                "TASKBRIDGE_STEP_DELAY_MS",
                defaults.step_delay.as_millis() as u64,
            )),
            bus_capacity: env_parse("TASKBRIDGE_BUS_CAPACITY", defaults.bus_capacity),
            grace: Duration::from_secs(env_parse(
                "TASKBRIDGE_GRACE_SECS",
                defaults.grace.as_secs(),
            )),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparsable environment variable");
                default
            }
        },
        Err(_) => default,
    }
}

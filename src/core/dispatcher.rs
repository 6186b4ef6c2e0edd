//! # Dispatcher: the control loop.
//!
//! Two logical states realized as one loop: `Idle` (waiting for the next
//! poll tick) and `Dispatching` (processing exactly one accepted command
//! before polling again).
//!
//! On each tick the dispatcher drains the command channel. For every
//! command it:
//! 1. allocates a fresh 8-hex-char task id,
//! 2. builds the job and starts a worker on its own task,
//! 3. registers the worker handle,
//! 4. synchronously replies `{"status":"started",...}`.
//!
//! No command ever waits on a worker; intake latency is bounded by the poll
//! interval.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Ack, Bus};
use crate::net::{CommandChannel, PendingCommand};
use crate::tasks::{self, Analysis, JobRef, Registry};

/// Polls the command channel and turns commands into running tasks.
pub struct Dispatcher {
    cfg: Config,
    bus: Bus,
    registry: Arc<Registry>,
    channel: CommandChannel,
}

impl Dispatcher {
    /// Creates a dispatcher over an already-bound command channel.
    pub fn new(cfg: Config, bus: Bus, registry: Arc<Registry>, channel: CommandChannel) -> Self {
        Self {
            cfg,
            bus,
            registry,
            channel,
        }
    }

    /// Runs the control loop until `token` is cancelled or a fatal error
    /// occurs (protocol violation, closed intake queue).
    pub async fn run(mut self, token: CancellationToken) -> Result<(), RuntimeError> {
        let mut tick = tokio::time::interval(self.cfg.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = tick.tick() => self.drain(&token).await?,
            }
        }
    }

    /// Accepts every command currently pending, one lock-step cycle each.
    async fn drain(&mut self, token: &CancellationToken) -> Result<(), RuntimeError> {
        while let Some(cmd) = self.channel.poll()? {
            self.dispatch(cmd, token).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        cmd: PendingCommand,
        token: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let text = cmd.text().to_string();
        let id = self.fresh_id().await;
        info!(task = %id, command = %text, "command accepted");

        let job: JobRef = Arc::new(Analysis::new(
            text.clone(),
            self.cfg.steps,
            self.cfg.step_delay,
        ));
        let handle = tasks::spawn(id.clone(), job, self.bus.clone(), token);
        if !self.registry.insert(id.clone(), handle).await {
            warn!(task = %id, "registry rejected freshly allocated id");
        }

        self.channel.reply(cmd, &Ack::started(id, text))
    }

    /// Allocates an id not currently in flight. Ids are opaque 8-hex-char
    /// strings (uuid4-derived), unsuitable as security tokens.
    async fn fresh_id(&self) -> String {
        loop {
            let id = short_id();
            if !self.registry.contains(&id).await {
                return id;
            }
        }
    }
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

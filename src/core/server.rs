//! # Server: endpoint binding, event relay, and graceful shutdown.
//!
//! [`Server`] assembles the whole system and owns its lifecycle.
//!
//! ## High-level architecture
//! ```text
//! Inputs:
//!   Config ──► Server::bind() — binds both endpoints eagerly (fatal on failure)
//!
//! Wiring (run):
//!   CommandChannel ──► Dispatcher ──► spawn worker + register + ack
//!   Worker 1..N ── publish(TaskEvent) ──► Bus ──┬──► relay ──► EventPublisher ──► subscribers
//!                                               └──► Registry listener (terminal cleanup)
//!
//! Shutdown path:
//!   OS signal / stop token
//!     └─► cancel runtime token  → dispatcher exits, accept loops stop,
//!                                  in-flight jobs are cancelled
//!     └─► wait up to Config::grace for the registry to drain
//!            ├─ drained  → Ok(())
//!            └─ timeout  → cancel_all, Err(GraceExceeded { stuck })
//! ```
//!
//! The relay is the **only** task that writes to the event socket; workers
//! publish to the bus and never see the network.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{dispatcher::Dispatcher, shutdown};
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::net::{CommandChannel, EventPublisher};
use crate::tasks::Registry;

/// Poll cadence while waiting for in-flight tasks to drain at shutdown.
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// The assembled hybrid command/event server.
pub struct Server {
    cfg: Config,
    bus: Bus,
    registry: Arc<Registry>,
    channel: CommandChannel,
    publisher: EventPublisher,
    runtime: CancellationToken,
}

impl Server {
    /// Binds both endpoints eagerly.
    ///
    /// Bind failures are fatal and carry the endpoint role and address in
    /// the diagnostic; the process cannot serve without both endpoints.
    pub async fn bind(cfg: Config) -> Result<Self, RuntimeError> {
        let runtime = CancellationToken::new();
        let bus = Bus::new(cfg.bus_capacity);

        let channel = CommandChannel::bind(cfg.command_addr, runtime.child_token()).await?;
        let publisher = EventPublisher::bind(cfg.event_addr, runtime.child_token()).await?;
        let registry = Registry::new(bus.clone());

        Ok(Self {
            cfg,
            bus,
            registry,
            channel,
            publisher,
            runtime,
        })
    }

    /// The bound command endpoint (useful when configured with port 0).
    pub fn command_addr(&self) -> SocketAddr {
        self.channel.local_addr()
    }

    /// The bound event endpoint.
    pub fn event_addr(&self) -> SocketAddr {
        self.publisher.local_addr()
    }

    /// Runs until an OS termination signal arrives, then shuts down
    /// gracefully.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown::wait_for_shutdown_signal().await {
                error!(error = %e, "failed to install signal handlers");
            }
            trigger.cancel();
        });
        self.run_until(stop).await
    }

    /// Runs until `stop` is cancelled. Used by `run()` and by embedders and
    /// tests that manage the lifecycle themselves.
    pub async fn run_until(self, stop: CancellationToken) -> Result<(), RuntimeError> {
        let Server {
            cfg,
            bus,
            registry,
            channel,
            publisher,
            runtime,
        } = self;

        // Listeners outlive the runtime token: cancelled workers still emit
        // terminal events that must reach subscribers and the registry while
        // the shutdown drain is in progress.
        let drain = CancellationToken::new();
        registry.clone().spawn_listener(drain.clone());
        spawn_relay(bus.subscribe(), publisher, drain.clone());

        let dispatcher = Dispatcher::new(cfg.clone(), bus.clone(), registry.clone(), channel);

        let result = tokio::select! {
            res = dispatcher.run(runtime.clone()) => {
                if let Err(e) = &res {
                    error!(label = e.as_label(), error = %e, "dispatcher aborted");
                }
                // No new work can arrive, but already-started workers still
                // owe their terminal events; drain them before the listeners
                // go away so the guarantee holds on this exit path too.
                runtime.cancel();
                res.and(wait_idle_with_grace(&registry, cfg.grace).await)
            }
            _ = stop.cancelled() => {
                info!("shutdown requested");
                runtime.cancel();
                wait_idle_with_grace(&registry, cfg.grace).await
            }
        };

        runtime.cancel();
        drain.cancel();
        result
    }
}

/// Forwards every bus event to the publish socket. The publisher is moved in
/// here, making this the single writer for the event endpoint.
fn spawn_relay(
    mut rx: broadcast::Receiver<crate::events::TaskEvent>,
    mut publisher: EventPublisher,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            // Biased toward the receiver: events already on the bus when the
            // token fires are still relayed before the task exits.
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => {
                        if let Err(e) = publisher.publish(&ev).await {
                            error!(label = e.as_label(), error = %e, "failed to publish event");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event relay lagged; subscribers missed events");
                    }
                },
                _ = token.cancelled() => break,
            }
        }
    });
}

/// Waits up to `grace` for every in-flight task to reach its terminal event.
async fn wait_idle_with_grace(
    registry: &Arc<Registry>,
    grace: Duration,
) -> Result<(), RuntimeError> {
    let drained = async {
        while !registry.is_empty().await {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    };

    match tokio::time::timeout(grace, drained).await {
        Ok(()) => {
            info!("all in-flight tasks drained");
            Ok(())
        }
        Err(_) => {
            let stuck = registry.list().await;
            warn!(?stuck, "grace period exceeded; cancelling remaining tasks");
            registry.cancel_all().await;
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use taskbridge::{Config, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env();
    let server = match Server::bind(cfg).await {
        Ok(server) => server,
        Err(e) => {
            error!(label = e.as_label(), error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    info!(commands = %server.command_addr(), events = %server.event_addr(), "taskbridge running");

    if let Err(e) = server.run().await {
        error!(label = e.as_label(), error = %e, "server exited with error");
        std::process::exit(1);
    }
}

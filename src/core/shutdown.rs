//! # Termination signal handling.
//!
//! [`wait_for_shutdown_signal`] resolves when the OS asks the process to
//! stop. [`Server::run`](crate::Server::run) turns that into a stop-token
//! cancel, which starts the shutdown sequence in `core::server`: cancel the
//! runtime token, then drain in-flight tasks within the configured grace.
//!
//! On Unix the server reacts to `SIGINT` (Ctrl-C), `SIGTERM` (service
//! managers) and `SIGQUIT`; elsewhere only Ctrl-C is available.

/// Resolves once a termination signal is delivered.
///
/// Errors only if the signal listeners cannot be installed; the caller
/// treats that as "shutdown will never be signalled" and logs it.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
    }
    Ok(())
}

/// Resolves once Ctrl-C is delivered.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

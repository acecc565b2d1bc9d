//! Turns a termination signal into a [`Signal::Shutdown`] broadcast.

use std::future::Future;

use sesrelay_common::{Signal, internal, tracing};
use tokio::sync::broadcast;

/// Resolves on SIGINT or SIGTERM, naming the one that arrived.
///
/// # Errors
///
/// Fails if the signal handlers can't be installed.
pub async fn termination() -> std::io::Result<&'static str> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

/// Waits for `trigger`, then tells everything subscribed to `sender` to stop.
///
/// # Errors
///
/// Whatever `trigger` failed with. Nothing is broadcast in that case.
#[tracing::instrument(level = tracing::Level::TRACE, skip_all, err)]
pub async fn coordinate<F>(trigger: F, sender: &broadcast::Sender<Signal>) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    let reason = trigger.await?;
    internal!(level = INFO, "{reason} received, shutting down");

    if sender.send(Signal::Shutdown).is_err() {
        tracing::debug!("Nothing subscribed to the shutdown signal");
    }

    Ok(())
}

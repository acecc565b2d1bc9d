use sesrelay_bridge::ConfigurationSetError;
use sesrelay_common::error::ListenerError;
use sesrelay_health::HealthError;
use sesrelay_metrics::MetricsError;
use sesrelay_ses::CredentialError;
use thiserror::Error;

/// Anything that stops the relay from starting, or from stopping cleanly.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    ConfigurationSet(#[from] ConfigurationSetError),

    #[error("SMTP listener failed: {0}")]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error("Unable to listen for termination signals: {0}")]
    Signal(std::io::Error),

    #[error("SMTP listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

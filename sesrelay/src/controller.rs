//! Startup and teardown of the relay.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use sesrelay_bridge::{
    MAX_MESSAGE_SIZE, MailTransport, RelayBackend, RelayContext, validate_configuration_set,
};
use sesrelay_common::{Signal, error::ListenerError, internal, tracing};
use sesrelay_health::{HealthChecker, HealthError, HealthServer};
use sesrelay_metrics::{
    Metrics, MetricsError, MetricsServer, OutcomeRecorder, RelayMetrics, init_metrics,
};
use sesrelay_ses::{CredentialContext, SesTransport};
use sesrelay_smtp::{Extension, Listener, SmtpConfig};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::{cli::Args, error::StartupError, shutdown};

/// How long auxiliary servers get to finish once shutdown is broadcast.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the process-wide pieces: the parsed flags, the shutdown broadcast
/// and the readiness flag.
pub struct Controller {
    args: Args,
    shutdown: broadcast::Sender<Signal>,
    health: Arc<HealthChecker>,
}

/// A relay whose listener is bound and accepting.
pub struct Running {
    smtp_address: SocketAddr,
    health_address: Option<SocketAddr>,
    metrics_address: Option<SocketAddr>,
    listener: JoinHandle<Result<(), ListenerError>>,
    services: Vec<JoinHandle<()>>,
    metrics: Metrics,
    health: Arc<HealthChecker>,
    shutdown: broadcast::Sender<Signal>,
}

impl Controller {
    #[must_use]
    pub fn new(args: Args) -> Self {
        let (shutdown, _) = broadcast::channel(16);

        Self {
            args,
            shutdown,
            health: Arc::new(HealthChecker::new(env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Starts the relay against SES and runs it until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Any [`StartupError`]: credentials that can't be resolved, a
    /// configuration set that doesn't exist, or an address that can't be
    /// bound.
    #[tracing::instrument(level = tracing::Level::TRACE, skip_all, err)]
    pub async fn run(self) -> Result<(), StartupError> {
        internal!(level = INFO, "Controller running");

        let health_service = self.start_health().await?;

        let credentials = CredentialContext::resolve(self.args.role()).await?;
        credentials.log_caller_identity().await;

        let transport: Arc<dyn MailTransport> = Arc::new(SesTransport::new(&credentials.config));

        self.start(transport, health_service)
            .await?
            .until(shutdown::termination())
            .await
    }

    /// Starts the relay with a caller-supplied transport, skipping AWS
    /// credential resolution.
    ///
    /// # Errors
    ///
    /// As for [`Controller::run`], minus credential failures.
    pub async fn start_with(
        self,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Running, StartupError> {
        let health_service = self.start_health().await?;
        self.start(transport, health_service).await
    }

    async fn start_health(&self) -> Result<Option<(SocketAddr, JoinHandle<()>)>, StartupError> {
        let Some(config) = self.args.health_config() else {
            return Ok(None);
        };

        let server = HealthServer::new(config, Arc::clone(&self.health)).await?;
        let address = server
            .local_addr()
            .map_err(|err| HealthError::ServerError(err.to_string()))?;
        let shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            if let Err(err) = server.serve(shutdown).await {
                internal!(level = ERROR, "{err}");
            }
        });

        Ok(Some((address, handle)))
    }

    async fn start(
        self,
        transport: Arc<dyn MailTransport>,
        health_service: Option<(SocketAddr, JoinHandle<()>)>,
    ) -> Result<Running, StartupError> {
        let mut services = Vec::new();
        let health_address = health_service.map(|(address, handle)| {
            services.push(handle);
            address
        });

        let configuration_set = validate_configuration_set(
            transport.as_ref(),
            self.args.configuration_set_name.as_deref(),
        )
        .await?;

        let metrics_config = self.args.metrics_config();
        let metrics = init_metrics(&metrics_config)?;
        let metrics_address = match metrics_config.prometheus_bind {
            Some(bind) => {
                let server = MetricsServer::new(&bind, Arc::clone(&metrics.relay)).await?;
                let address = server.local_addr().map_err(MetricsError::from)?;
                let shutdown = self.shutdown.subscribe();

                services.push(tokio::spawn(async move {
                    if let Err(err) = server.serve(shutdown).await {
                        internal!(level = ERROR, "{err}");
                    }
                }));

                Some(address)
            }
            None => None,
        };

        let context = RelayContext::new(
            transport,
            configuration_set,
            Arc::clone(&metrics.relay) as Arc<dyn OutcomeRecorder>,
        );
        let backend = Arc::new(RelayBackend::new(Arc::new(context)));

        let listener = Listener::bind(&self.args.listen, backend, smtp_config(&self.args)).await?;
        let smtp_address = listener.local_addr().map_err(ListenerError::from)?;
        let listener = tokio::spawn(listener.serve(self.shutdown.subscribe()));

        self.health.set_smtp_ready(true);
        internal!(level = INFO, "Relay ready on {smtp_address}");

        Ok(Running {
            smtp_address,
            health_address,
            metrics_address,
            listener,
            services,
            metrics,
            health: self.health,
            shutdown: self.shutdown,
        })
    }
}

fn smtp_config(args: &Args) -> SmtpConfig {
    SmtpConfig {
        domain: args.domain.clone(),
        extensions: vec![
            Extension::Pipelining,
            Extension::EightBitMime,
            Extension::EnhancedStatusCodes,
            Extension::Size(MAX_MESSAGE_SIZE),
            Extension::Auth(vec![String::from("PLAIN")]),
        ],
        ..SmtpConfig::default()
    }
}

impl Running {
    #[must_use]
    pub const fn smtp_address(&self) -> SocketAddr {
        self.smtp_address
    }

    #[must_use]
    pub const fn health_address(&self) -> Option<SocketAddr> {
        self.health_address
    }

    #[must_use]
    pub const fn metrics_address(&self) -> Option<SocketAddr> {
        self.metrics_address
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics.relay)
    }

    /// A sender that stops the relay when [`Signal::Shutdown`] is sent on it.
    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<Signal> {
        self.shutdown.clone()
    }

    /// Serves until `trigger` resolves or the listener stops, then shuts
    /// everything down. The listening socket is closed by the time this
    /// returns; sessions still in flight are told to stop but not awaited.
    ///
    /// # Errors
    ///
    /// [`StartupError::Signal`] if `trigger` fails, or the listener's own
    /// error if it stopped on its own.
    pub async fn until<F>(mut self, trigger: F) -> Result<(), StartupError>
    where
        F: Future<Output = std::io::Result<&'static str>>,
    {
        let served = tokio::select! {
            served = &mut self.listener => served,
            triggered = shutdown::coordinate(trigger, &self.shutdown) => {
                if let Err(err) = triggered {
                    self.listener.abort();
                    self.stop().await;
                    return Err(StartupError::Signal(err));
                }

                (&mut self.listener).await
            }
        };

        self.stop().await;
        internal!(level = INFO, "Shutdown complete");

        served??;
        Ok(())
    }

    async fn stop(&mut self) {
        let _ = self.shutdown.send(Signal::Shutdown);
        self.health.set_smtp_ready(false);

        for service in self.services.drain(..) {
            if tokio::time::timeout(DRAIN_TIMEOUT, service).await.is_err() {
                tracing::warn!("Auxiliary server did not stop within {DRAIN_TIMEOUT:?}");
            }
        }

        self.metrics.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn advertises_message_size_limit() {
        let args = <Args as clap::Parser>::try_parse_from([
            "ses-smtpd-relay",
            "--domain",
            "relay.example.com",
        ])
        .unwrap();
        let config = smtp_config(&args);

        assert_eq!(config.domain, "relay.example.com");
        assert_eq!(config.max_message_size(), Some(40_000_000));
        assert!(config.supports_auth("plain"));
    }
}

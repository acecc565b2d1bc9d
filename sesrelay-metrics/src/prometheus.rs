//! Prometheus text exposition of the relay counters.

use core::fmt::{self, Display, Formatter};
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use sesrelay_common::Signal;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{FailureCause, MetricsError, RelayMetrics, RelaySnapshot};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders the counters in the Prometheus text format (version 0.0.4).
#[must_use]
pub fn render(metrics: &RelayMetrics) -> String {
    Exposition(metrics.snapshot()).to_string()
}

struct Exposition(RelaySnapshot);

fn counter_header(f: &mut Formatter<'_>, name: &str, help: &str) -> fmt::Result {
    writeln!(f, "# HELP {name} {help}")?;
    writeln!(f, "# TYPE {name} counter")
}

impl Display for Exposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let snapshot = &self.0;

        counter_header(
            f,
            "smtpd_email_send_success_total",
            "Total number of successfully sent emails",
        )?;
        writeln!(f, "smtpd_email_send_success_total {}", snapshot.sent)?;

        counter_header(
            f,
            "smtpd_email_send_fail_total",
            "Total number of emails that failed to send",
        )?;
        for cause in FailureCause::ALL {
            writeln!(
                f,
                "smtpd_email_send_fail_total{{type=\"{cause}\"}} {}",
                snapshot.failures(cause)
            )?;
        }

        counter_header(
            f,
            "smtpd_ses_error_total",
            "Total number of errors returned by SES",
        )?;
        writeln!(f, "smtpd_ses_error_total {}", snapshot.provider_errors)
    }
}

/// Serves `/metrics` for Prometheus to scrape.
pub struct MetricsServer {
    listener: TcpListener,
    router: Router,
}

impl MetricsServer {
    /// Binds the scrape endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn new(address: &str, metrics: Arc<RelayMetrics>) -> Result<Self, MetricsError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| MetricsError::Bind {
                address: address.to_string(),
                source,
            })?;

        tracing::info!(%address, "Prometheus metrics server bound successfully");

        let router = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(metrics)
            .layer(TimeoutLayer::new(Duration::from_secs(1)));

        Ok(Self { listener, router })
    }

    /// The bound address.
    ///
    /// # Errors
    ///
    /// Propagates the socket error if the address can't be read.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until the shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), MetricsError> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Metrics server received shutdown signal");
            })
            .await?;

        Ok(())
    }
}

async fn metrics_handler(State(metrics): State<Arc<RelayMetrics>>) -> Response {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], render(&metrics)).into_response()
}

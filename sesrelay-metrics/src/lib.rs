//! Delivery outcome metrics for the relay.
//!
//! The relay reports through [`OutcomeRecorder`]. [`RelayMetrics`] is the
//! production recorder: it counts locally, optionally pushes over OTLP and
//! optionally serves the counters for Prometheus to scrape.
//!
//! ```text
//! sesrelay → OTLP/HTTP → OpenTelemetry Collector
//!          ← GET /metrics ← Prometheus
//! ```

mod config;
mod error;
mod exporter;
mod outcome;
mod prometheus;
mod relay;

use std::sync::Arc;

pub use config::MetricsConfig;
pub use error::MetricsError;
use opentelemetry_sdk::metrics::SdkMeterProvider;
pub use outcome::{FailureCause, OutcomeRecorder};
pub use prometheus::{MetricsServer, render};
pub use relay::{RelayMetrics, RelaySnapshot};

/// The counters plus whatever exporter is keeping them company.
#[derive(Debug)]
pub struct Metrics {
    pub relay: Arc<RelayMetrics>,
    provider: Option<SdkMeterProvider>,
}

impl Metrics {
    /// Flushes and stops the OTLP exporter, if one was started.
    pub fn shutdown(&self) {
        if let Some(provider) = &self.provider {
            if let Err(err) = provider.shutdown() {
                tracing::warn!(%err, "Failed to flush metrics on shutdown");
            }
        }
    }
}

/// Sets up the metric instruments.
///
/// With an OTLP endpoint configured, an exporting meter provider is
/// installed globally before the instruments are created.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be built.
pub fn init_metrics(config: &MetricsConfig) -> Result<Metrics, MetricsError> {
    let provider = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!(%endpoint, "Initializing OpenTelemetry metrics with OTLP exporter");

            let provider = exporter::init_otlp_exporter(endpoint)?;
            opentelemetry::global::set_meter_provider(provider.clone());
            Some(provider)
        }
        None => None,
    };

    Ok(Metrics {
        relay: Arc::new(RelayMetrics::new()),
        provider,
    })
}

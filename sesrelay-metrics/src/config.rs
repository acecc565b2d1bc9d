//! Metrics configuration

use serde::Deserialize;

/// Where, if anywhere, delivery outcome counters are exported.
///
/// Counting happens regardless. Both exporters are optional and
/// independent of each other.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// OTLP/HTTP endpoint to push metrics to, e.g.
    /// `http://localhost:4318/v1/metrics`.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Address to serve Prometheus text exposition on, at `/metrics`.
    #[serde(default)]
    pub prometheus_bind: Option<String>,
}

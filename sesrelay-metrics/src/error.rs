//! Error types for metrics operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    /// OpenTelemetry SDK error
    #[error("OpenTelemetry error: {0}")]
    OpenTelemetry(String),

    #[error("Failed to bind metrics server to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    HttpServer(#[from] std::io::Error),
}

//! Health check HTTP server

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use sesrelay_common::Signal;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{HealthChecker, HealthConfig, HealthError};

/// Serves `/health`, `/health/live` and `/health/ready`.
pub struct HealthServer {
    listener: TcpListener,
    router: Router,
}

impl HealthServer {
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn new(
        config: HealthConfig,
        health_checker: Arc<HealthChecker>,
    ) -> Result<Self, HealthError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| HealthError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "Health check server bound successfully"
        );

        let router = router(health_checker);

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

    /// Run until the shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), HealthError> {
        tracing::info!("Health check server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Health check server received shutdown signal");
            })
            .await
            .map_err(|e| HealthError::ServerError(e.to_string()))?;

        tracing::info!("Health check server stopped");
        Ok(())
    }
}

fn router(health_checker: Arc<HealthChecker>) -> Router {
    Router::new()
        .route("/health", get(info_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(health_checker)
        // Probes must answer within a second
        .layer(TimeoutLayer::new(Duration::from_secs(1)))
}

async fn info_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    (StatusCode::OK, Json(health_checker.info())).into_response()
}

async fn liveness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_alive() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
    }
}

async fn readiness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_ready() {
        (StatusCode::OK, "OK").into_response()
    } else {
        let status = health_checker.get_status();
        tracing::warn!(smtp_ready = status.smtp_ready, "Readiness probe failed");
        (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response()
    }
}

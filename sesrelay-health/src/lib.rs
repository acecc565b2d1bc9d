//! Health check endpoints for the relay.
//!
//! # Endpoints
//!
//! - **`/health`** - Service name, status and version as JSON
//! - **`/health/live`** - Liveness probe: 200 while the process is running
//! - **`/health/ready`** - Readiness probe: 200 once the SMTP listener is bound

mod checker;
mod config;
mod error;
mod server;

pub use checker::{HealthChecker, HealthStatus, SERVICE_NAME, ServiceInfo};
pub use config::HealthConfig;
pub use error::HealthError;
pub use server::HealthServer;

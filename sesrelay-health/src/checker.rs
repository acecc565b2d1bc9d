//! Health check logic

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "ses-smtpd-relay";

/// Tracks whether the relay is ready for traffic.
#[derive(Debug)]
pub struct HealthChecker {
    /// Whether the SMTP listener is bound and accepting connections
    smtp_ready: AtomicBool,

    version: String,
}

/// `/health` body
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub status: &'static str,
    pub version: String,
}

/// Detailed readiness, returned when the readiness probe fails
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub alive: bool,
    pub ready: bool,
    pub smtp_ready: bool,
}

impl HealthChecker {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            smtp_ready: AtomicBool::new(false),
            version: version.into(),
        }
    }

    /// Mark SMTP as ready (listener bound)
    pub fn set_smtp_ready(&self, ready: bool) {
        self.smtp_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "SMTP readiness updated");
    }

    /// For liveness we only need to respond at all.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.smtp_ready.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: SERVICE_NAME,
            status: "ok",
            version: self.version.clone(),
        }
    }

    #[must_use]
    pub fn get_status(&self) -> HealthStatus {
        let smtp_ready = self.smtp_ready.load(Ordering::Relaxed);

        HealthStatus {
            alive: self.is_alive(),
            ready: smtp_ready,
            smtp_ready,
        }
    }
}

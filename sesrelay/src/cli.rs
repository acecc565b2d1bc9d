//! Command line flags.

use clap::Parser;
use sesrelay_health::HealthConfig;
use sesrelay_metrics::MetricsConfig;
use sesrelay_ses::RoleAssumption;

/// Name the relay reports in its version string and health endpoint.
pub const PROGRAM_NAME: &str = "ses-smtpd-relay";

/// SMTP server that relays every accepted message to Amazon SES.
#[derive(Debug, Clone, Parser)]
#[command(name = PROGRAM_NAME, disable_version_flag = true)]
pub struct Args {
    /// Address to accept SMTP connections on
    #[arg(default_value = "0.0.0.0:2500")]
    pub listen: String,

    /// SES configuration set attached to every message
    #[arg(long)]
    pub configuration_set_name: Option<String>,

    /// Serve Prometheus metrics
    #[arg(long)]
    pub enable_prometheus: bool,

    #[arg(long, default_value = "0.0.0.0:2501")]
    pub prometheus_bind: String,

    /// Push metrics to an OTLP/HTTP collector
    #[arg(long)]
    pub otlp_endpoint: Option<String>,

    /// Serve the health check endpoints
    #[arg(long)]
    pub enable_health_check: bool,

    #[arg(long, default_value = "0.0.0.0:3000")]
    pub health_check_bind: String,

    /// IAM role to assume before talking to SES
    #[arg(long, env = "AWS_ROLE_ARN")]
    pub role_arn: Option<String>,

    /// Session name used when assuming `--role-arn`
    #[arg(long, env = "AWS_ROLE_SESSION_NAME")]
    pub role_session_name: Option<String>,

    /// Hostname given in the SMTP greeting
    #[arg(long, default_value = "localhost")]
    pub domain: String,

    /// Print version information and exit
    #[arg(long)]
    pub version: bool,
}

impl Args {
    #[must_use]
    pub fn role(&self) -> Option<RoleAssumption> {
        RoleAssumption::from_parts(self.role_arn.clone(), self.role_session_name.clone())
    }

    #[must_use]
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            otlp_endpoint: self.otlp_endpoint.clone().filter(|url| !url.is_empty()),
            prometheus_bind: self
                .enable_prometheus
                .then(|| self.prometheus_bind.clone()),
        }
    }

    #[must_use]
    pub fn health_config(&self) -> Option<HealthConfig> {
        self.enable_health_check.then(|| HealthConfig {
            listen_address: self.health_check_bind.clone(),
        })
    }
}

#[must_use]
pub fn version_line() -> String {
    format!("{PROGRAM_NAME} version {}", env!("CARGO_PKG_VERSION"))
}

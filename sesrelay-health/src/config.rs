//! Health check configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Address to bind the health check server
    ///
    /// Common values:
    /// - `0.0.0.0:3000` (IPv4 any address, port 3000)
    /// - `127.0.0.1:3000` (localhost only)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

fn default_listen_address() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

//! Process bootstrap for the SMTP to SES relay.
//!
//! [`Controller`] brings the pieces up in order (health endpoint, AWS
//! credentials, configuration set, metrics, SMTP listener) and tears them
//! down again when the process is asked to stop.

pub mod cli;
pub mod controller;
pub mod error;
pub mod shutdown;

pub use cli::Args;
pub use controller::{Controller, Running};
pub use error::StartupError;

//! Amazon SES behind the relay's [`MailTransport`](sesrelay_bridge::MailTransport).

pub mod credentials;
pub mod error;
pub mod transport;

pub use credentials::{CredentialContext, DEFAULT_SESSION_NAME, RoleAssumption};
pub use error::CredentialError;
pub use transport::SesTransport;

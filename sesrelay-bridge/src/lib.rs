//! The transaction bridge: collects an SMTP transaction and turns it into a
//! single raw-message send.
//!
//! The SMTP engine drives a [`RelaySession`] per connection. On DATA the body
//! is read (bounded by [`MAX_MESSAGE_SIZE`]), handed to the configured
//! [`MailTransport`] once, and the outcome becomes both the reply and a
//! counter increment.

pub mod auth;
pub mod backend;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod transaction;
pub mod transport;
pub mod validator;

pub use auth::{AuthPolicy, TrustAll};
pub use backend::{RelayBackend, RelaySession};
pub use context::RelayContext;
pub use error::{ConfigurationSetError, TransactionError, TransportError};
pub use transaction::{CompletedTransaction, Phase, Transaction};
pub use transport::{MailTransport, RawEmailRequest};
pub use validator::validate_configuration_set;

/// Largest raw message the sending API accepts, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 40_000_000;

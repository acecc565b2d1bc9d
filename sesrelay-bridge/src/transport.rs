use async_trait::async_trait;

use crate::{error::TransportError, transaction::CompletedTransaction};

/// One raw-message send: the envelope, the message exactly as received, and
/// the configuration set to tag it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEmailRequest {
    pub source: String,
    pub destinations: Vec<String>,
    pub raw_message: Vec<u8>,
    /// Omitted from the request entirely when `None`.
    pub configuration_set_name: Option<String>,
}

impl RawEmailRequest {
    #[must_use]
    pub fn new(transaction: CompletedTransaction, configuration_set_name: Option<&str>) -> Self {
        Self {
            source: transaction.sender,
            destinations: transaction.recipients,
            raw_message: transaction.body,
            configuration_set_name: configuration_set_name.map(ToString::to_string),
        }
    }
}

/// The sending API, as far as the relay is concerned.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Sends one message. Returns the provider's message id when it gives one.
    ///
    /// # Errors
    ///
    /// Whatever the provider or the transport to it reported.
    async fn send_raw(&self, request: RawEmailRequest) -> Result<Option<String>, TransportError>;

    /// Read-only check that a configuration set exists and is accessible.
    ///
    /// # Errors
    ///
    /// When the set is unknown, inaccessible, or the check couldn't be made.
    async fn configuration_set_exists(&self, name: &str) -> Result<(), TransportError>;
}

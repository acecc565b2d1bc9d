use std::sync::Arc;

use sesrelay_metrics::OutcomeRecorder;

use crate::{
    auth::{AuthPolicy, TrustAll},
    transport::MailTransport,
};

/// Everything connections share. Built once at startup and never changed.
#[derive(Clone)]
pub struct RelayContext {
    pub transport: Arc<dyn MailTransport>,
    /// Only set once the set has been validated. `None` means sends carry no
    /// configuration set at all.
    pub configuration_set_name: Option<String>,
    pub outcomes: Arc<dyn OutcomeRecorder>,
    pub auth: Arc<dyn AuthPolicy>,
}

impl RelayContext {
    /// A context that trusts every client.
    pub fn new(
        transport: Arc<dyn MailTransport>,
        configuration_set_name: Option<String>,
        outcomes: Arc<dyn OutcomeRecorder>,
    ) -> Self {
        Self {
            transport,
            configuration_set_name,
            outcomes,
            auth: Arc::new(TrustAll),
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthPolicy>) -> Self {
        self.auth = auth;
        self
    }
}

impl core::fmt::Debug for RelayContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelayContext")
            .field("configuration_set_name", &self.configuration_set_name)
            .finish_non_exhaustive()
    }
}

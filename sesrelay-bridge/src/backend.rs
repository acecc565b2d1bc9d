//! Plugs the transaction bridge into the SMTP engine.

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use sesrelay_common::status::Reply;
use sesrelay_smtp::{Backend, BackendSession, MailParameters};
use tokio::io::AsyncRead;

use crate::{
    context::RelayContext,
    error::TransactionError,
    pipeline,
    transaction::{Transaction, read_body},
};

/// Hands each connection a fresh [`RelaySession`] over the shared context.
#[derive(Debug, Clone)]
pub struct RelayBackend {
    context: Arc<RelayContext>,
}

impl RelayBackend {
    #[must_use]
    pub const fn new(context: Arc<RelayContext>) -> Self {
        Self { context }
    }
}

impl Backend for RelayBackend {
    type Session = RelaySession;

    fn new_session(&self, peer: SocketAddr) -> Self::Session {
        RelaySession::new(peer, Arc::clone(&self.context))
    }
}

#[derive(Debug)]
pub struct RelaySession {
    peer: SocketAddr,
    context: Arc<RelayContext>,
    transaction: Transaction,
}

impl RelaySession {
    #[must_use]
    pub fn new(peer: SocketAddr, context: Arc<RelayContext>) -> Self {
        Self {
            peer,
            context,
            transaction: Transaction::default(),
        }
    }

    #[must_use]
    pub const fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Reads the body and relays the transaction.
    ///
    /// With no recipients the body is left unread and the transaction is
    /// kept, so the client may still add recipients. Any other outcome
    /// clears it.
    ///
    /// # Errors
    ///
    /// The [`TransactionError`] for whatever stopped the send. It has already
    /// been counted.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip_all, fields(peer = %self.peer))]
    pub async fn submit<R>(&mut self, body: &mut R) -> Result<Option<String>, TransactionError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let result = self.relay_body(body).await;

        if let Err(err) = &result {
            tracing::warn!(%err, "Message not relayed");
            self.context.outcomes.record_failure(err.cause());
        }

        result
    }

    async fn relay_body<R>(&mut self, body: &mut R) -> Result<Option<String>, TransactionError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        if !self.transaction.has_recipients() {
            return Err(TransactionError::NoRecipients);
        }

        match read_body(body).await {
            Ok(body) => self.transaction.set_body(body),
            Err(err) => {
                self.transaction.reset();
                return Err(err);
            }
        }

        let Some(completed) = self.transaction.take_completed() else {
            return Err(TransactionError::NoRecipients);
        };

        pipeline::relay(&self.context, completed).await
    }
}

#[async_trait]
impl BackendSession for RelaySession {
    async fn auth_plain(
        &mut self,
        identity: &str,
        username: &str,
        password: &str,
    ) -> Result<(), Reply> {
        self.context
            .auth
            .authenticate(identity, username, password)
            .await
    }

    async fn mail(&mut self, from: &str, params: &MailParameters) -> Result<(), Reply> {
        if !params.is_empty() {
            tracing::debug!(%from, %params, "MAIL parameters");
        }
        self.transaction.declare_sender(from);
        Ok(())
    }

    async fn rcpt(&mut self, to: &str) -> Result<(), Reply> {
        self.transaction.add_recipient(to);
        Ok(())
    }

    async fn data(
        &mut self,
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<Option<String>, Reply> {
        self.submit(body).await.map_err(|err| err.reply())
    }

    fn reset(&mut self) {
        self.transaction.reset();
    }

    fn logout(&mut self) {}
}

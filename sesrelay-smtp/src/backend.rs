//! The seam between the protocol engine and whatever handles the mail.
//!
//! A [`Backend`] hands out one [`Session`] per accepted connection. The
//! engine drives the session with the envelope and body as the client sends
//! them, and turns each rejection into the reply the client sees.

use std::net::SocketAddr;

use async_trait::async_trait;
use sesrelay_common::status::Reply;
use tokio::io::AsyncRead;

use crate::command::MailParameters;

pub trait Backend: Send + Sync + 'static {
    type Session: Session + 'static;

    fn new_session(&self, peer: SocketAddr) -> Self::Session;
}

#[async_trait]
pub trait Session: Send {
    /// `AUTH PLAIN` with the decoded authorisation identity, username and
    /// password.
    async fn auth_plain(
        &mut self,
        identity: &str,
        username: &str,
        password: &str,
    ) -> Result<(), Reply>;

    /// MAIL FROM. `from` is empty for the null sender.
    async fn mail(&mut self, from: &str, params: &MailParameters) -> Result<(), Reply>;

    async fn rcpt(&mut self, to: &str) -> Result<(), Reply>;

    /// Consumes the message body.
    ///
    /// The engine drains whatever is left of `body` afterwards and resets the
    /// transaction, unless this rejected the message without reading from
    /// `body` at all. In that case the transaction stays open. On success
    /// the returned identifier, if any, is quoted back to the client.
    async fn data(&mut self, body: &mut (dyn AsyncRead + Unpin + Send))
    -> Result<Option<String>, Reply>;

    /// RSET, HELO/EHLO and the end of every DATA command.
    fn reset(&mut self);

    /// The connection is going away.
    fn logout(&mut self);
}

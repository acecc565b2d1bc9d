//! `AUTH PLAIN` (RFC 4616) over the RFC 4954 exchange.

use base64::{Engine, engine::general_purpose::STANDARD};
use sesrelay_common::{
    error::SessionError,
    incoming,
    status::{EnhancedCode, Reply, Status},
};
use tokio::io::{AsyncRead, AsyncWrite};

use super::Session;
use crate::{backend, error::ConnectionError};

/// The `authzid NUL authcid NUL passwd` triple.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct PlainCredentials {
    pub identity: String,
    pub username: String,
    pub password: String,
}

impl PlainCredentials {
    pub(super) fn decode(response: &str) -> Option<Self> {
        // A lone `=` is an empty initial response.
        let decoded = if response == "=" {
            Vec::new()
        } else {
            STANDARD.decode(response).ok()?
        };

        let mut parts = decoded.split(|&byte| byte == 0);
        let (Some(identity), Some(username), Some(password), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        if username.is_empty() {
            return None;
        }

        Some(Self {
            identity: String::from_utf8(identity.to_vec()).ok()?,
            username: String::from_utf8(username.to_vec()).ok()?,
            password: String::from_utf8(password.to_vec()).ok()?,
        })
    }
}

impl<Stream, Handler> Session<Stream, Handler>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
    Handler: backend::Session,
{
    pub(super) async fn auth(
        &mut self,
        mechanism: &str,
        initial: Option<String>,
    ) -> Result<Reply, SessionError> {
        if !self.config.supports_auth(mechanism) || mechanism != "PLAIN" {
            return Ok(Reply::new(
                Status::ParameterNotImplemented,
                EnhancedCode::new(5, 5, 4),
                "Unsupported authentication mechanism",
            ));
        }

        let response = if let Some(initial) = initial {
            initial
        } else {
            self.reply(&Reply::plain(Status::AuthContinue, "")).await?;
            let line = self
                .connection
                .read_line()
                .await?
                .ok_or(ConnectionError::Closed)?;
            incoming!("<credentials>");
            line
        };

        if response.trim() == "*" {
            return Ok(Reply::new(
                Status::ParameterError,
                EnhancedCode::new(5, 0, 0),
                "Authentication cancelled",
            ));
        }

        let Some(credentials) = PlainCredentials::decode(response.trim()) else {
            return Ok(Reply::new(
                Status::ParameterError,
                EnhancedCode::new(5, 5, 2),
                "Malformed authentication response",
            ));
        };

        Ok(
            match self
                .handler
                .auth_plain(
                    &credentials.identity,
                    &credentials.username,
                    &credentials.password,
                )
                .await
            {
                Ok(()) => Reply::new(
                    Status::AuthSucceeded,
                    EnhancedCode::new(2, 7, 0),
                    "Authentication successful",
                ),
                Err(reply) => reply,
            },
        )
    }
}

#[cfg(test)]
mod test {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use pretty_assertions::assert_eq;

    use super::PlainCredentials;

    #[test]
    fn decodes_plain_triple() {
        let encoded = STANDARD.encode(b"\0user\0secret");

        assert_eq!(
            PlainCredentials::decode(&encoded),
            Some(PlainCredentials {
                identity: String::new(),
                username: String::from("user"),
                password: String::from("secret"),
            })
        );
    }

    #[test]
    fn rejects_malformed_responses() {
        assert_eq!(PlainCredentials::decode("not base64!"), None);
        assert_eq!(PlainCredentials::decode("="), None);
        assert_eq!(PlainCredentials::decode(&STANDARD.encode(b"user\0secret")), None);
        assert_eq!(PlainCredentials::decode(&STANDARD.encode(b"\0\0secret")), None);
        assert_eq!(
            PlainCredentials::decode(&STANDARD.encode(b"a\0b\0c\0d")),
            None
        );
    }
}

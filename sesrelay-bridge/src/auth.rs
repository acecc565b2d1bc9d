use async_trait::async_trait;
use sesrelay_common::status::Reply;

/// Decides whether an `AUTH PLAIN` exchange succeeds.
#[async_trait]
pub trait AuthPolicy: Send + Sync {
    /// # Errors
    ///
    /// The reply to send when the credentials are refused.
    async fn authenticate(&self, identity: &str, username: &str, password: &str)
    -> Result<(), Reply>;
}

/// Accepts any credentials.
///
/// The relay trusts its network perimeter. `AUTH` is accepted only so that
/// clients which insist on authenticating can still hand over mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustAll;

#[async_trait]
impl AuthPolicy for TrustAll {
    async fn authenticate(&self, _identity: &str, username: &str, _password: &str) -> Result<(), Reply> {
        tracing::debug!(%username, "Accepting credentials");
        Ok(())
    }
}

//! Startup credential resolution.

use aws_config::{BehaviorVersion, SdkConfig, sts::AssumeRoleProvider};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_sts::error::DisplayErrorContext;

use crate::error::CredentialError;

pub const DEFAULT_SESSION_NAME: &str = "ses-smtpd-relay-session";

/// A role to act as instead of the base credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssumption {
    pub role_arn: String,
    pub session_name: String,
}

impl RoleAssumption {
    /// Role assumption happens only when a role ARN is given. Empty values
    /// count as absent, and the session name falls back to
    /// [`DEFAULT_SESSION_NAME`].
    #[must_use]
    pub fn from_parts(role_arn: Option<String>, session_name: Option<String>) -> Option<Self> {
        let role_arn = role_arn.filter(|arn| !arn.is_empty())?;
        let session_name = session_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());

        Some(Self {
            role_arn,
            session_name,
        })
    }
}

/// Resolved AWS configuration shared by every client the relay builds.
#[derive(Debug, Clone)]
pub struct CredentialContext {
    pub config: SdkConfig,
    pub role: Option<RoleAssumption>,
}

impl CredentialContext {
    /// Loads the default provider chain (environment, shared files, instance
    /// metadata) and checks it yields credentials. With a role, the result
    /// is wrapped in a caching role-assumption provider.
    ///
    /// # Errors
    ///
    /// [`CredentialError`] if no base credentials can be resolved.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip_all)]
    pub async fn resolve(role: Option<RoleAssumption>) -> Result<Self, CredentialError> {
        let base = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let provider = base
            .credentials_provider()
            .ok_or(CredentialError::NoProvider)?;
        provider
            .provide_credentials()
            .await
            .map_err(|err| CredentialError::Resolve(DisplayErrorContext(&err).to_string()))?;

        let config = match &role {
            None => base,
            Some(role) => {
                tracing::info!(
                    role_arn = %role.role_arn,
                    session_name = %role.session_name,
                    "Assuming role"
                );

                let assumed = AssumeRoleProvider::builder(role.role_arn.clone())
                    .session_name(role.session_name.clone())
                    .configure(&base)
                    .build()
                    .await;

                base.into_builder()
                    .credentials_provider(SharedCredentialsProvider::new(assumed))
                    .build()
            }
        };

        Ok(Self { config, role })
    }

    /// Logs who the relay is acting as. Failure is only a warning.
    pub async fn log_caller_identity(&self) {
        let sts = aws_sdk_sts::Client::new(&self.config);

        match sts.get_caller_identity().send().await {
            Ok(identity) => tracing::info!(
                account = identity.account().unwrap_or_default(),
                arn = identity.arn().unwrap_or_default(),
                "Using AWS identity"
            ),
            Err(err) => tracing::warn!(
                "Could not verify AWS identity: {}",
                DisplayErrorContext(&err)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn no_role_without_arn() {
        assert_eq!(RoleAssumption::from_parts(None, None), None);
        assert_eq!(
            RoleAssumption::from_parts(None, Some(String::from("custom"))),
            None
        );
        assert_eq!(RoleAssumption::from_parts(Some(String::new()), None), None);
    }

    #[test]
    fn session_name_defaults() {
        let arn = "arn:aws:iam::123456789012:role/mailer";

        assert_eq!(
            RoleAssumption::from_parts(Some(arn.to_string()), None),
            Some(RoleAssumption {
                role_arn: arn.to_string(),
                session_name: String::from("ses-smtpd-relay-session"),
            })
        );
        assert_eq!(
            RoleAssumption::from_parts(Some(arn.to_string()), Some(String::new()))
                .map(|role| role.session_name),
            Some(String::from(DEFAULT_SESSION_NAME))
        );
        assert_eq!(
            RoleAssumption::from_parts(Some(arn.to_string()), Some(String::from("relay-1")))
                .map(|role| role.session_name),
            Some(String::from("relay-1"))
        );
    }
}

use crate::{error::ConfigurationSetError, transport::MailTransport};

/// Checks the configured configuration set before any mail is accepted.
///
/// An empty name counts as no name. Returns the name sends should carry.
///
/// # Errors
///
/// [`ConfigurationSetError`] naming the set if the check fails for any
/// reason.
#[tracing::instrument(level = tracing::Level::DEBUG, skip(transport))]
pub async fn validate_configuration_set<T>(
    transport: &T,
    name: Option<&str>,
) -> Result<Option<String>, ConfigurationSetError>
where
    T: MailTransport + ?Sized,
{
    let Some(name) = name.filter(|name| !name.is_empty()) else {
        tracing::info!("No configuration set requested");
        return Ok(None);
    };

    transport
        .configuration_set_exists(name)
        .await
        .map_err(|source| ConfigurationSetError {
            name: name.to_string(),
            source,
        })?;

    tracing::info!(configuration_set = %name, "Configuration set validated");
    Ok(Some(name.to_string()))
}

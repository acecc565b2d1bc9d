use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ses::{error::DisplayErrorContext, primitives::Blob, types::RawMessage};
use sesrelay_bridge::{MailTransport, RawEmailRequest, TransportError};

/// Sends through Amazon SES `SendRawEmail`.
#[derive(Debug, Clone)]
pub struct SesTransport {
    client: aws_sdk_ses::Client,
}

impl SesTransport {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ses::Client::new(config),
        }
    }
}

/// Wraps the message bytes the way `SendRawEmail` wants them.
pub(crate) fn raw_message(data: Vec<u8>) -> Result<RawMessage, TransportError> {
    RawMessage::builder()
        .data(Blob::new(data))
        .build()
        .map_err(|err| TransportError::InvalidRequest(err.to_string()))
}

#[async_trait]
impl MailTransport for SesTransport {
    #[tracing::instrument(level = tracing::Level::DEBUG, skip_all, fields(source = %request.source))]
    async fn send_raw(&self, request: RawEmailRequest) -> Result<Option<String>, TransportError> {
        let RawEmailRequest {
            source,
            destinations,
            raw_message: data,
            configuration_set_name,
        } = request;

        let output = self
            .client
            .send_raw_email()
            .source(source)
            .set_destinations(Some(destinations))
            .raw_message(raw_message(data)?)
            .set_configuration_set_name(configuration_set_name)
            .send()
            .await
            .map_err(|err| TransportError::Api {
                operation: "SendRawEmail",
                message: DisplayErrorContext(&err).to_string(),
            })?;

        Ok(Some(output.message_id().to_string()))
    }

    async fn configuration_set_exists(&self, name: &str) -> Result<(), TransportError> {
        self.client
            .describe_configuration_set()
            .configuration_set_name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| TransportError::Api {
                operation: "DescribeConfigurationSet",
                message: DisplayErrorContext(&err).to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn raw_message_carries_bytes_unchanged() {
        let body = b"Subject: hi\r\n\r\n.hello\r\n".to_vec();

        let message = raw_message(body.clone()).unwrap();
        assert_eq!(message.data().as_ref(), body.as_slice());
    }
}

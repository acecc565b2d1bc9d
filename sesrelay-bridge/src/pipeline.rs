use crate::{
    context::RelayContext,
    error::TransactionError,
    transaction::CompletedTransaction,
    transport::RawEmailRequest,
};

/// Sends a completed transaction, exactly once.
///
/// Counts the outcome and returns the provider's message id on success.
///
/// # Errors
///
/// [`TransactionError::Send`] when the transport fails. Nothing is retried.
pub async fn relay(
    context: &RelayContext,
    transaction: CompletedTransaction,
) -> Result<Option<String>, TransactionError> {
    let source = transaction.sender.clone();
    let destinations = transaction.recipients.clone();
    let request = RawEmailRequest::new(transaction, context.configuration_set_name.as_deref());

    match context.transport.send_raw(request).await {
        Ok(message_id) => {
            let config_set = context
                .configuration_set_name
                .as_deref()
                .map_or_else(|| String::from("no config set"), |name| format!("config set: {name}"));

            tracing::info!(
                message_id = message_id.as_deref().unwrap_or_default(),
                "sending message from {source} to {destinations:?} ({config_set})"
            );
            context.outcomes.record_success();

            Ok(message_id)
        }
        Err(err) => {
            tracing::error!(%err, %source, "Failed to send message");
            context.outcomes.record_provider_error();

            Err(TransactionError::Send(err))
        }
    }
}

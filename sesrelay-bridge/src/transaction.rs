//! The per-connection mail transaction.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{MAX_MESSAGE_SIZE, error::TransactionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    HasSender,
    HasRecipients,
    Completed,
}

/// Sender, recipients and body of the transaction in progress.
///
/// Owned by a single connection. Nothing here validates addresses beyond
/// what the protocol engine already did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transaction {
    sender: String,
    recipients: Vec<String>,
    body: Option<Vec<u8>>,
}

/// A transaction with at least one recipient and a body, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransaction {
    pub sender: String,
    pub recipients: Vec<String>,
    pub body: Vec<u8>,
}

impl Transaction {
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.body.is_some() {
            Phase::Completed
        } else if !self.recipients.is_empty() {
            Phase::HasRecipients
        } else if !self.sender.is_empty() {
            Phase::HasSender
        } else {
            Phase::Idle
        }
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn declare_sender(&mut self, sender: &str) {
        self.sender = sender.to_string();
    }

    pub fn add_recipient(&mut self, recipient: &str) {
        self.recipients.push(recipient.to_string());
    }

    #[must_use]
    pub fn has_recipients(&self) -> bool {
        !self.recipients.is_empty()
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    /// Hands the transaction over for sending and leaves this one empty.
    ///
    /// Returns `None`, and changes nothing, unless there is at least one
    /// recipient and a body.
    pub fn take_completed(&mut self) -> Option<CompletedTransaction> {
        if self.recipients.is_empty() || self.body.is_none() {
            return None;
        }

        let taken = std::mem::take(self);
        Some(CompletedTransaction {
            sender: taken.sender,
            recipients: taken.recipients,
            body: taken.body.unwrap_or_default(),
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reads a message body, refusing anything over [`MAX_MESSAGE_SIZE`].
///
/// At most one byte past the limit is read, so an oversized message costs no
/// more memory than the largest acceptable one.
///
/// # Errors
///
/// [`TransactionError::Read`] if the reader fails, and
/// [`TransactionError::SizeExceeded`] if the body is too large.
pub async fn read_body<R>(body: &mut R) -> Result<Vec<u8>, TransactionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let limit = u64::try_from(MAX_MESSAGE_SIZE).unwrap_or(u64::MAX) + 1;
    let mut buffer = Vec::new();

    (&mut *body)
        .take(limit)
        .read_to_end(&mut buffer)
        .await
        .map_err(TransactionError::Read)?;

    if buffer.len() > MAX_MESSAGE_SIZE {
        return Err(TransactionError::SizeExceeded {
            size: buffer.len(),
            limit: MAX_MESSAGE_SIZE,
        });
    }

    Ok(buffer)
}

use std::io;

use sesrelay_common::status::{EnhancedCode, Reply, Status};
use sesrelay_metrics::FailureCause;
use thiserror::Error;

/// A failure reported by the sending API client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The API was reached and said no, or couldn't be reached at all.
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    /// The request couldn't be built from what the client sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Why a DATA command didn't end in a send.
///
/// Every variant maps to exactly one reply and one failure label, and none of
/// them closes the connection.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("No recipients declared")]
    NoRecipients,

    #[error("Failed to read message body: {0}")]
    Read(#[source] io::Error),

    #[error("Message of at least {size} bytes exceeds the {limit} byte limit")]
    SizeExceeded { size: usize, limit: usize },

    #[error("Send failed: {0}")]
    Send(#[from] TransportError),
}

impl TransactionError {
    #[must_use]
    pub const fn cause(&self) -> FailureCause {
        match self {
            Self::NoRecipients => FailureCause::NoRecipients,
            Self::Read(_) => FailureCause::ReadError,
            Self::SizeExceeded { .. } => FailureCause::SizeExceeded,
            Self::Send(_) => FailureCause::SendError,
        }
    }

    /// The reply the client sees. Read and send failures invite a retry,
    /// the other two are permanent.
    #[must_use]
    pub fn reply(&self) -> Reply {
        match self {
            Self::NoRecipients => Reply::new(
                Status::TransactionFailed,
                EnhancedCode::new(5, 5, 1),
                "Error: no valid recipients",
            ),
            Self::Read(_) => Reply::new(
                Status::ActionAborted,
                EnhancedCode::new(4, 5, 1),
                "Temporary server error reading message",
            ),
            Self::SizeExceeded { .. } => Reply::new(
                Status::TransactionFailed,
                EnhancedCode::new(5, 5, 1),
                "Error: maximum message size exceeded",
            ),
            Self::Send(_) => Reply::new(
                Status::ActionAborted,
                EnhancedCode::new(4, 5, 1),
                "Temporary server error. Please try again later",
            ),
        }
    }
}

/// The configured configuration set can't be used.
#[derive(Debug, Error)]
#[error("Configuration set '{name}' could not be validated: {source}")]
pub struct ConfigurationSetError {
    pub name: String,
    #[source]
    pub source: TransportError,
}

use core::fmt::{self, Display, Formatter};

/// Why a message submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// DATA with no recipients declared.
    NoRecipients,
    /// The body could not be read off the connection.
    ReadError,
    /// The body was larger than the sending API accepts.
    SizeExceeded,
    /// The sending API refused or failed the request.
    SendError,
}

impl FailureCause {
    pub const ALL: [Self; 4] = [
        Self::NoRecipients,
        Self::ReadError,
        Self::SizeExceeded,
        Self::SendError,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoRecipients => "NoRecipients",
            Self::ReadError => "ReadError",
            Self::SizeExceeded => "SizeExceeded",
            Self::SendError => "SendError",
        }
    }
}

impl Display for FailureCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the relay reports what happened to each submitted message.
///
/// Exactly one of [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure) is called per DATA command.
/// [`record_provider_error`](Self::record_provider_error) is additionally
/// called whenever the failure came from the sending API.
pub trait OutcomeRecorder: Send + Sync {
    fn record_success(&self);

    fn record_failure(&self, cause: FailureCause);

    fn record_provider_error(&self);
}

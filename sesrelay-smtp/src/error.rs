use std::io;

use sesrelay_common::error::SessionError;
use thiserror::Error;

/// Errors from reading or writing the client socket.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Line exceeds the {limit} byte limit")]
    LineTooLong { limit: usize },

    #[error("Connection closed by peer")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

impl From<ConnectionError> for SessionError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Io(err) => Self::Connection(err),
            ConnectionError::Closed => {
                Self::Connection(io::Error::from(io::ErrorKind::UnexpectedEof))
            }
            err @ ConnectionError::LineTooLong { .. } => Self::Protocol(err.to_string()),
        }
    }
}

//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::extensions::Extension;

/// RFC 5321 server-side timeouts.
///
/// - Waiting for a command: 5 minutes
/// - Between blocks of message data: 3 minutes
/// - Overall connection: 30 minutes
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerTimeouts {
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// Idle time allowed between chunks of a message body. Expiry is reported
    /// to the body consumer as a read failure.
    #[serde(default = "defaults::data_block_secs")]
    pub data_block_secs: u64,

    #[serde(default = "defaults::connection_secs")]
    pub connection_secs: u64,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            command_secs: defaults::command_secs(),
            data_block_secs: defaults::data_block_secs(),
            connection_secs: defaults::connection_secs(),
        }
    }
}

impl ServerTimeouts {
    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data_block(&self) -> Duration {
        Duration::from_secs(self.data_block_secs)
    }

    #[must_use]
    pub const fn connection(&self) -> Duration {
        Duration::from_secs(self.connection_secs)
    }
}

/// Everything a listener needs to know about how to talk to clients.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Name used in the greeting and the HELO/EHLO reply.
    #[serde(default = "defaults::domain")]
    pub domain: String,

    #[serde(default = "defaults::extensions")]
    pub extensions: Vec<Extension>,

    /// Longest command line accepted, excluding the CRLF.
    #[serde(default = "defaults::max_line_length")]
    pub max_line_length: usize,

    #[serde(default)]
    pub timeouts: ServerTimeouts,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            domain: defaults::domain(),
            extensions: defaults::extensions(),
            max_line_length: defaults::max_line_length(),
            timeouts: ServerTimeouts::default(),
        }
    }
}

impl SmtpConfig {
    /// The advertised `SIZE` limit, if any.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(max) if *max > 0 => Some(*max),
            _ => None,
        })
    }

    /// Whether `mechanism` is listed in an advertised `AUTH` extension.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.extensions.iter().any(|ext| match ext {
            Extension::Auth(mechanisms) => mechanisms
                .iter()
                .any(|m| m.eq_ignore_ascii_case(mechanism)),
            _ => false,
        })
    }
}

mod defaults {
    use crate::extensions::Extension;

    pub const fn command_secs() -> u64 {
        300
    }

    pub const fn data_block_secs() -> u64 {
        180
    }

    pub const fn connection_secs() -> u64 {
        1800
    }

    pub fn domain() -> String {
        String::from("localhost")
    }

    pub const fn max_line_length() -> usize {
        2000
    }

    pub fn extensions() -> Vec<Extension> {
        vec![
            Extension::Pipelining,
            Extension::EightBitMime,
            Extension::EnhancedStatusCodes,
            Extension::Auth(vec![String::from("PLAIN")]),
        ]
    }
}

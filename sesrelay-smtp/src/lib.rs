//! The SMTP side of the relay: command parsing, session sequencing, message
//! body framing and the listener.
//!
//! What happens to a message is up to the [`backend::Backend`] the listener
//! is given.

pub mod backend;
pub mod command;
pub mod config;
pub mod connection;
pub mod data;
pub mod error;
pub mod extensions;
pub mod listener;
pub mod session;
pub mod state;

pub use backend::{Backend, Session as BackendSession};
pub use command::MailParameters;
pub use config::{ServerTimeouts, SmtpConfig};
pub use extensions::Extension;
pub use listener::Listener;

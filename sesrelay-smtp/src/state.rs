use sesrelay_common::status::{EnhancedCode, Reply, Status};

use crate::command::Command;

/// Where a session is in the RFC 5321 command sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum State {
    /// Connected, no HELO/EHLO yet.
    #[default]
    Connect,
    /// Greeted, no transaction in progress.
    Ready,
    /// MAIL FROM accepted.
    MailFrom,
    /// At least one RCPT TO accepted.
    RcptTo,
}

fn out_of_sequence(message: &'static str) -> Reply {
    Reply {
        status: Status::InvalidCommandSequence,
        enhanced: Some(EnhancedCode::new(5, 5, 1)),
        message: std::borrow::Cow::Borrowed(message),
    }
}

impl State {
    /// Checks that `command` may be issued now.
    ///
    /// DATA is allowed straight after MAIL FROM so the handler can reject a
    /// transaction with no recipients in its own words.
    ///
    /// # Errors
    ///
    /// The `503` reply to send when the command is out of sequence.
    pub fn permits(self, command: &Command) -> Result<(), Reply> {
        match (self, command) {
            (Self::Connect, Command::MailFrom(..) | Command::Auth { .. }) => {
                Err(out_of_sequence("Error: send HELO/EHLO first"))
            }
            (Self::MailFrom | Self::RcptTo, Command::MailFrom(..)) => {
                Err(out_of_sequence("Error: nested MAIL command"))
            }
            (Self::Connect | Self::Ready, Command::RcptTo(_) | Command::Data) => {
                Err(out_of_sequence("Error: need MAIL command"))
            }
            (Self::MailFrom | Self::RcptTo, Command::Auth { .. }) => Err(out_of_sequence(
                "Error: AUTH not permitted during a mail transaction",
            )),
            _ => Ok(()),
        }
    }
}

use sesrelay_common::{
    error::SessionError,
    internal,
    status::{EnhancedCode, Reply, Status},
    tracing,
};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Event, Session};
use crate::{
    backend,
    command::{Command, HeloVariant, MailParameters},
    state::State,
};

const fn ok(message: &'static str) -> Reply {
    Reply {
        status: Status::Ok,
        enhanced: Some(EnhancedCode::new(2, 0, 0)),
        message: std::borrow::Cow::Borrowed(message),
    }
}

impl<Stream, Handler> Session<Stream, Handler>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
    Handler: backend::Session,
{
    pub(super) async fn dispatch(&mut self, command: Command) -> Result<Event, SessionError> {
        if let Err(reply) = self.state.permits(&command) {
            self.reply(&reply).await?;
            return Ok(Event::ConnectionKeepAlive);
        }

        let reply = match command {
            Command::Helo(variant) => return self.helo(variant).await,
            Command::MailFrom(from, params) => self.mail(from, &params).await,
            Command::RcptTo(to) => self.rcpt(to).await,
            Command::Data => self.data().await?,
            Command::Auth { mechanism, initial } => self.auth(&mechanism, initial).await?,
            Command::Rset => {
                self.reset_transaction();
                ok("Flushed")
            }
            Command::Noop => ok("Ok"),
            Command::Vrfy(_) => Reply::new(
                Status::CannotVerify,
                EnhancedCode::new(2, 5, 0),
                "Cannot VRFY user, but will accept message and attempt delivery",
            ),
            Command::Help => Reply::new(
                Status::HelpMessage,
                EnhancedCode::new(2, 0, 0),
                "Supported commands: HELO EHLO MAIL RCPT DATA RSET NOOP VRFY AUTH QUIT",
            ),
            Command::Quit => {
                self.reply(&Reply::new(
                    Status::GoodBye,
                    EnhancedCode::new(2, 0, 0),
                    "Bye",
                ))
                .await?;
                return Ok(Event::ConnectionClose);
            }
            Command::Invalid(reason) => Reply::new(
                Status::ParameterError,
                EnhancedCode::new(5, 5, 4),
                format!("Syntax error: {reason}"),
            ),
            Command::Unrecognised(_) => Reply::new(
                Status::SyntaxError,
                EnhancedCode::new(5, 5, 2),
                "Error: command not recognized",
            ),
        };

        self.reply(&reply).await?;
        Ok(Event::ConnectionKeepAlive)
    }

    /// Drops any transaction in progress. The greeting survives.
    pub(super) fn reset_transaction(&mut self) {
        self.handler.reset();
        self.state = if self.client_id.is_some() {
            State::Ready
        } else {
            State::Connect
        };
    }

    async fn helo(&mut self, variant: HeloVariant) -> Result<Event, SessionError> {
        self.client_id = Some(variant.id().to_string());
        self.reset_transaction();

        let greeting = format!("{} says hello to {}", self.config.domain, variant.id());

        match variant {
            HeloVariant::Helo(_) => {
                self.reply(&Reply::plain(Status::Ok, greeting)).await?;
            }
            HeloVariant::Ehlo(_) => {
                let lines = std::iter::once(greeting)
                    .chain(self.config.extensions.iter().map(ToString::to_string))
                    .collect::<Vec<_>>();

                for line in &lines {
                    sesrelay_common::outgoing!("{} {line}", Status::Ok);
                }
                self.connection.send_multiline(Status::Ok, &lines).await?;
            }
        }

        Ok(Event::ConnectionKeepAlive)
    }

    async fn mail(&mut self, from: String, params: &MailParameters) -> Reply {
        if let (Some(declared), Some(max)) = (params.size(), self.config.max_message_size()) {
            if declared > max {
                return Reply::new(
                    Status::ExceededStorage,
                    EnhancedCode::new(5, 3, 4),
                    "Error: message size exceeds fixed maximum message size",
                );
            }
        }

        match self.handler.mail(&from, params).await {
            Ok(()) => {
                self.state = State::MailFrom;
                Reply::new(
                    Status::Ok,
                    EnhancedCode::new(2, 1, 0),
                    format!("Sender <{from}> ok"),
                )
            }
            Err(reply) => reply,
        }
    }

    async fn rcpt(&mut self, to: String) -> Reply {
        match self.handler.rcpt(&to).await {
            Ok(()) => {
                self.state = State::RcptTo;
                Reply::new(
                    Status::Ok,
                    EnhancedCode::new(2, 1, 5),
                    format!("Recipient <{to}> ok"),
                )
            }
            Err(reply) => reply,
        }
    }

    async fn data(&mut self) -> Result<Reply, SessionError> {
        self.reply(&Reply::plain(
            Status::StartMailInput,
            "Start mail input; end with <CRLF>.<CRLF>",
        ))
        .await?;

        let mut body = self
            .connection
            .data_reader(self.config.timeouts.data_block());
        let outcome = self.handler.data(&mut body).await;

        // A rejection that never looked at the body leaves the transaction
        // open, so the client can still add recipients.
        let keep_transaction = outcome.is_err() && body.is_untouched();

        // Whatever the handler left unread still has to come off the wire
        // before the next command.
        let drained = if body.is_finished() {
            Ok(0)
        } else {
            tokio::io::copy(&mut body, &mut tokio::io::sink()).await
        };

        if !keep_transaction {
            self.reset_transaction();
        }

        if let Err(err) = drained {
            internal!(level = DEBUG, "Unable to read the rest of the message: {err}");
            return Err(SessionError::Connection(err));
        }

        Ok(match outcome {
            Ok(Some(id)) => Reply::new(
                Status::Ok,
                EnhancedCode::new(2, 0, 0),
                format!("Ok: queued as {id}"),
            ),
            Ok(None) => ok("Ok: queued"),
            Err(reply) => {
                tracing::debug!(%reply, "Message rejected");
                reply
            }
        })
    }
}

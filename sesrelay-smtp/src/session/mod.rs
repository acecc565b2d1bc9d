use std::{net::SocketAddr, sync::Arc, time::Instant};

use sesrelay_common::{
    Signal,
    error::SessionError,
    incoming, internal, outgoing,
    status::{EnhancedCode, Reply, Status},
    tracing,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::broadcast,
};

use crate::{
    backend,
    command::Command,
    config::SmtpConfig,
    connection::Connection,
    error::ConnectionError,
    state::State,
};

mod auth;
mod commands;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Event {
    ConnectionClose,
    ConnectionKeepAlive,
}

/// One client connection, from greeting to close.
pub struct Session<Stream, Handler>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
    Handler: backend::Session,
{
    peer: SocketAddr,
    connection: Connection<Stream>,
    handler: Handler,
    config: Arc<SmtpConfig>,
    state: State,
    /// The name the client gave in HELO/EHLO.
    client_id: Option<String>,
    start_time: Instant,
}

impl<Stream, Handler> Session<Stream, Handler>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
    Handler: backend::Session,
{
    pub fn new(stream: Stream, peer: SocketAddr, handler: Handler, config: Arc<SmtpConfig>) -> Self {
        Self {
            peer,
            connection: Connection::new(stream, config.max_line_length),
            handler,
            config,
            state: State::default(),
            client_id: None,
            start_time: Instant::now(),
        }
    }

    /// Greets the client and serves commands until it quits, the connection
    /// drops or `signal` announces a shutdown.
    ///
    /// # Errors
    ///
    /// I/O failures, timeouts and protocol violations that force the
    /// connection closed.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip_all, fields(peer = %self.peer))]
    pub async fn run(mut self, mut signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        internal!("Connected");

        let greeting = Reply::plain(
            Status::ServiceReady,
            format!("{} ESMTP Service Ready", self.config.domain),
        );
        let result = match self.reply(&greeting).await {
            Ok(()) => self.serve(&mut signal).await,
            Err(err) => Err(err),
        };

        self.handler.logout();
        internal!("Connection closed");

        result
    }

    async fn serve(&mut self, signal: &mut broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        loop {
            let max_lifetime = self.config.timeouts.connection();
            if self.start_time.elapsed() >= max_lifetime {
                tracing::warn!(
                    peer = %self.peer,
                    max_secs = max_lifetime.as_secs(),
                    "Connection exceeded maximum lifetime, closing"
                );
                self.reply(&Reply::new(
                    Status::Unavailable,
                    EnhancedCode::new(4, 4, 2),
                    "Connection lifetime exceeded",
                ))
                .await?;
                return Err(SessionError::Timeout(max_lifetime.as_secs()));
            }

            let command_timeout = self.config.timeouts.command();

            let line = tokio::select! {
                _ = signal.recv() => {
                    internal!(level = DEBUG, "Shutdown requested, closing connection");
                    self.reply(&Reply::new(
                        Status::Unavailable,
                        EnhancedCode::new(4, 3, 0),
                        "Server shutting down",
                    ))
                    .await?;
                    return Ok(());
                }
                line = tokio::time::timeout(command_timeout, self.connection.read_line()) => line,
            };

            let line = match line {
                Err(_elapsed) => {
                    tracing::warn!(
                        peer = %self.peer,
                        state = ?self.state,
                        timeout_secs = command_timeout.as_secs(),
                        "Client connection timed out"
                    );
                    self.reply(&Reply::new(
                        Status::Unavailable,
                        EnhancedCode::new(4, 4, 2),
                        "Timeout waiting for command",
                    ))
                    .await?;
                    return Err(SessionError::Timeout(command_timeout.as_secs()));
                }
                Ok(Err(err @ ConnectionError::LineTooLong { .. })) => {
                    self.reply(&Reply::new(
                        Status::SyntaxError,
                        EnhancedCode::new(5, 4, 0),
                        "Error: line too long",
                    ))
                    .await?;
                    return Err(err.into());
                }
                Ok(Err(err)) => return Err(err.into()),
                Ok(Ok(None)) => return Ok(()),
                Ok(Ok(Some(line))) => line,
            };

            let command = Command::try_from(line.as_str()).unwrap_or_else(|e| e);
            incoming!("{command}");

            if self.dispatch(command).await? == Event::ConnectionClose {
                return Ok(());
            }
        }
    }

    async fn reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        outgoing!("{reply}");
        self.connection.send(reply).await.map_err(|err| {
            internal!(level = ERROR, "{err}");
            SessionError::from(err)
        })
    }
}

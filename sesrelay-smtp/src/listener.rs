use std::{net::SocketAddr, sync::Arc};

use sesrelay_common::{Signal, error::ListenerError, internal, tracing};
use tokio::{
    net::TcpListener,
    sync::broadcast::{self, error::RecvError},
};

use crate::{backend::Backend, config::SmtpConfig, session::Session};

/// Accepts SMTP clients and runs one session task per connection.
pub struct Listener<B: Backend> {
    listener: TcpListener,
    backend: Arc<B>,
    config: Arc<SmtpConfig>,
}

impl<B: Backend> Listener<B> {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// [`ListenerError::BindFailed`] when the address is invalid or in use.
    pub async fn bind(
        address: &str,
        backend: Arc<B>,
        config: SmtpConfig,
    ) -> Result<Self, ListenerError> {
        let listener =
            TcpListener::bind(address)
                .await
                .map_err(|source| ListenerError::BindFailed {
                    address: address.to_string(),
                    source,
                })?;

        Ok(Self {
            listener,
            backend,
            config: Arc::new(config),
        })
    }

    /// The address actually bound, useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Propagates the socket error if the address can't be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until a shutdown signal arrives, then drops the
    /// socket.
    ///
    /// Sessions run on their own tasks and are not waited on. Each one gets
    /// the same shutdown signal and closes itself at its next command.
    ///
    /// # Errors
    ///
    /// Accept failures are logged and skipped, so this only fails if the
    /// listener can't be used at all.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip_all, err)]
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), ListenerError> {
        let address = self.local_addr()?;
        internal!(level = INFO, "SMTP listener serving on {address}");

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) | Err(RecvError::Closed) => {
                            internal!(level = INFO, "SMTP listener {address} received shutdown signal, no longer accepting");
                            break;
                        }
                        Err(RecvError::Lagged(_)) => {}
                    }
                }

                connection = self.listener.accept() => {
                    let (stream, peer) = match connection {
                        Ok(connection) => connection,
                        Err(err) => {
                            tracing::warn!(%err, "Failed to accept connection");
                            continue;
                        }
                    };

                    tracing::debug!(%peer, "Connection received on {address}");

                    let session = Session::new(
                        stream,
                        peer,
                        self.backend.new_session(peer),
                        Arc::clone(&self.config),
                    );
                    let signal = shutdown.resubscribe();

                    tokio::spawn(async move {
                        if let Err(err) = session.run(signal).await {
                            if err.is_client_error() {
                                tracing::debug!(%peer, "Session ended: {err}");
                            } else {
                                internal!(level = ERROR, "Error: {err}");
                            }
                        }
                    });
                }
            }
        }

        Ok(())
    }
}

use core::fmt::Display;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

use crate::{
    data::DataReader,
    error::{ConnectionError, ConnectionResult},
};

/// A buffered client connection that speaks in CRLF-terminated lines.
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    stream: BufStream<Stream>,
    max_line_length: usize,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Connection<Stream> {
    pub fn new(stream: Stream, max_line_length: usize) -> Self {
        Self {
            stream: BufStream::new(stream),
            max_line_length,
        }
    }

    #[tracing::instrument(level = tracing::Level::TRACE, skip_all)]
    pub(crate) async fn send<S: Display + Send + Sync>(
        &mut self,
        response: &S,
    ) -> ConnectionResult<()> {
        self.stream
            .write_all(format!("{response}\r\n").as_bytes())
            .await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Writes a multi-line reply, marking every line but the last as a
    /// continuation.
    pub(crate) async fn send_multiline<S: Display + Send + Sync>(
        &mut self,
        code: S,
        lines: &[String],
    ) -> ConnectionResult<()> {
        let mut buffer = String::new();
        for (idx, line) in lines.iter().enumerate() {
            let separator = if idx + 1 == lines.len() { ' ' } else { '-' };
            buffer.push_str(&format!("{code}{separator}{line}\r\n"));
        }

        self.stream.write_all(buffer.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads one command line with its line ending removed.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection. A final
    /// line without a line ending is still handed back.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::LineTooLong`] when no line ending turns up within
    /// the configured limit. The connection is unusable afterwards.
    #[tracing::instrument(level = tracing::Level::TRACE, skip_all)]
    pub(crate) async fn read_line(&mut self) -> ConnectionResult<Option<String>> {
        // Room for the CRLF on top of the line itself.
        let limit = u64::try_from(self.max_line_length + 2).unwrap_or(u64::MAX);
        let mut buffer = Vec::new();

        let read = (&mut self.stream)
            .take(limit)
            .read_until(b'\n', &mut buffer)
            .await?;

        if read == 0 {
            return Ok(None);
        }

        if buffer.last() == Some(&b'\n') {
            buffer.pop();
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
        } else if u64::try_from(read).unwrap_or(u64::MAX) >= limit {
            return Err(ConnectionError::LineTooLong {
                limit: self.max_line_length,
            });
        }

        Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
    }

    /// Hands out the message body that follows a `354` reply.
    pub(crate) fn data_reader(&mut self, idle_timeout: Duration) -> DataReader<'_, BufStream<Stream>> {
        DataReader::new(&mut self.stream, idle_timeout)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn reads_lines_without_terminators() {
        let (client, server) = tokio::io::duplex(1024);
        let mut connection = Connection::new(server, 2000);
        let mut client = client;

        client
            .write_all(b"EHLO client.example\r\nNOOP\nQUIT")
            .await
            .unwrap();
        drop(client);

        assert_eq!(
            connection.read_line().await.unwrap().as_deref(),
            Some("EHLO client.example")
        );
        assert_eq!(connection.read_line().await.unwrap().as_deref(), Some("NOOP"));
        assert_eq!(connection.read_line().await.unwrap().as_deref(), Some("QUIT"));
        assert_eq!(connection.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_overlong_lines() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut connection = Connection::new(server, 16);

        client
            .write_all(format!("NOOP {}\r\n", "x".repeat(32)).as_bytes())
            .await
            .unwrap();

        assert!(matches!(
            connection.read_line().await,
            Err(ConnectionError::LineTooLong { limit: 16 })
        ));
    }

    #[tokio::test]
    async fn accepts_line_at_limit() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut connection = Connection::new(server, 4);

        client.write_all(b"NOOP\r\n").await.unwrap();

        assert_eq!(connection.read_line().await.unwrap().as_deref(), Some("NOOP"));
    }

    #[tokio::test]
    async fn multiline_replies() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut connection = Connection::new(server, 2000);

        connection
            .send_multiline(
                250,
                &[String::from("localhost"), String::from("PIPELINING"), String::from("8BITMIME")],
            )
            .await
            .unwrap();
        drop(connection);

        let mut written = String::new();
        client.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "250-localhost\r\n250-PIPELINING\r\n250 8BITMIME\r\n");
    }
}

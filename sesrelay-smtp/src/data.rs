//! The message body of a DATA command as an [`AsyncRead`].
//!
//! RFC 5321 §4.5.2 transparency: a line that starts with `.` has that dot
//! removed, and a line holding nothing but `.` ends the message. The CRLF in
//! front of the terminating line belongs to the message.

use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};
use std::{future::Future, io, time::Duration};

use tokio::{
    io::{AsyncBufRead, AsyncRead, ReadBuf},
    time::{Instant, Sleep},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DotState {
    /// At the start of a line.
    BeginLine,
    /// Saw a dot at the start of a line.
    Dot,
    /// Saw `.\r` at the start of a line.
    DotCr,
    /// Somewhere in the middle of a line.
    Data,
    /// Saw a CR in the middle of a line.
    Cr,
    /// Consumed the terminating `.\r\n`.
    Eof,
}

/// Reads a dot-stuffed message body off the connection, stopping at the
/// terminating line.
///
/// Each read that makes progress pushes the idle deadline back. When the
/// deadline passes with nothing to read the reader fails with
/// [`io::ErrorKind::TimedOut`].
pub struct DataReader<'a, R> {
    inner: &'a mut R,
    state: DotState,
    /// Set by the first read.
    started: bool,
    idle_timeout: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl<'a, R: AsyncBufRead + Unpin> DataReader<'a, R> {
    pub fn new(inner: &'a mut R, idle_timeout: Duration) -> Self {
        Self {
            inner,
            state: DotState::BeginLine,
            started: false,
            idle_timeout,
            deadline: Box::pin(tokio::time::sleep(idle_timeout)),
        }
    }

    /// Whether the terminating line has been consumed.
    pub fn is_finished(&self) -> bool {
        self.state == DotState::Eof
    }

    /// Whether nothing has tried to read the body yet.
    pub const fn is_untouched(&self) -> bool {
        !self.started
    }
}

/// Runs the transparency state machine over `input`, writing message bytes
/// into `out`. Returns how many input bytes were consumed.
fn unstuff(state: &mut DotState, input: &[u8], out: &mut ReadBuf<'_>) -> usize {
    let mut consumed = 0;

    // Every step writes at most one byte.
    while consumed < input.len() && *state != DotState::Eof && out.remaining() > 0 {
        let byte = input[consumed];
        consumed += 1;

        *state = match (*state, byte) {
            (DotState::BeginLine, b'.') => DotState::Dot,
            (DotState::Dot, b'\r') => DotState::DotCr,
            (DotState::DotCr, b'\n') => DotState::Eof,
            (DotState::DotCr, _) => {
                // `.\r` followed by anything else is data: the dot was
                // stuffing, the CR is content.
                out.put_slice(b"\r");
                consumed -= 1;
                DotState::Data
            }
            (DotState::BeginLine | DotState::Dot | DotState::Data | DotState::Cr, b'\r') => {
                out.put_slice(b"\r");
                DotState::Cr
            }
            (DotState::Cr, b'\n') => {
                out.put_slice(b"\n");
                DotState::BeginLine
            }
            (_, byte) => {
                out.put_slice(&[byte]);
                DotState::Data
            }
        };
    }

    consumed
}

impl<R: AsyncBufRead + Unpin> AsyncRead for DataReader<'_, R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.started = true;
        let start = buf.filled().len();

        while this.state != DotState::Eof && buf.remaining() > 0 {
            let available = match Pin::new(&mut *this.inner).poll_fill_buf(cx) {
                Poll::Ready(result) => result?,
                Poll::Pending => {
                    if buf.filled().len() > start {
                        return Poll::Ready(Ok(()));
                    }

                    ready!(this.deadline.as_mut().poll(cx));
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "timed out waiting for message data",
                    )));
                }
            };

            if available.is_empty() {
                if buf.filled().len() > start {
                    return Poll::Ready(Ok(()));
                }

                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before end of message data",
                )));
            }

            let consumed = unstuff(&mut this.state, available, buf);
            Pin::new(&mut *this.inner).consume(consumed);

            if consumed > 0 {
                let deadline = Instant::now() + this.idle_timeout;
                this.deadline.as_mut().reset(deadline);
            }
        }

        Poll::Ready(Ok(()))
    }
}

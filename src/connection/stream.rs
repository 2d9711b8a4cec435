//! Framed Client Stream
//!
//! [`Connection`] wraps one client socket: a `BytesMut` read buffer for
//! assembling command lines and data blocks, and a `BufWriter` that collects
//! responses until the worker flushes them.
//!
//! TCP is a stream protocol, so a single read may hold half a command line or
//! several pipelined commands. Bytes stay in the buffer until a complete frame
//! is available.

use crate::connection::handler::ConnectionError;
use crate::connection::stats::ConnectionStats;
use crate::protocol::{find_crlf, parse_line, parse_payload, ParseError, Response, CRLF};
use bytes::{Buf, Bytes, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::trace;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Any bidirectional byte stream a client can talk over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// A client stream with protocol framing.
pub struct Connection {
    stream: BufWriter<Box<dyn AsyncStream>>,
    buffer: BytesMut,
    stats: Arc<ConnectionStats>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl Connection {
    pub fn new(stream: impl AsyncStream + 'static, stats: Arc<ConnectionStats>) -> Self {
        Self {
            stream: BufWriter::new(Box::new(stream)),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            stats,
        }
    }

    /// Reads the next command line, without its CRLF.
    ///
    /// Returns `Ok(None)` when the client closed the stream between commands.
    /// A line that is not valid UTF-8 is consumed and reported as
    /// [`ParseError::InvalidUtf8`]; the stream stays usable.
    pub async fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        loop {
            match parse_line(&self.buffer) {
                Ok(Some((line, consumed))) => {
                    self.buffer.advance(consumed);
                    trace!(consumed, remaining = self.buffer.len(), "Parsed line");
                    return Ok(Some(line));
                }
                Ok(None) => {}
                Err(ParseError::InvalidUtf8) => {
                    if let Some(pos) = find_crlf(&self.buffer) {
                        self.buffer.advance(pos + 2);
                    }
                    return Err(ParseError::InvalidUtf8.into());
                }
                Err(e) => return Err(e.into()),
            }

            if !self.read_more_data().await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(ConnectionError::UnexpectedEof)
                };
            }
        }
    }

    /// Reads a data block of exactly `len` bytes plus its CRLF.
    ///
    /// The block is consumed even when the terminator is wrong, in which case
    /// [`ParseError::BadDataChunk`] is returned.
    pub async fn read_payload(&mut self, len: usize) -> Result<Bytes, ConnectionError> {
        loop {
            match parse_payload(&self.buffer, len) {
                Ok(Some((data, consumed))) => {
                    self.buffer.advance(consumed);
                    return Ok(data);
                }
                Ok(None) => {}
                Err(e) => {
                    self.buffer.advance(len.saturating_add(2).min(self.buffer.len()));
                    return Err(e.into());
                }
            }

            if !self.read_more_data().await? {
                return Err(ConnectionError::UnexpectedEof);
            }
        }
    }

    /// Skips a data block of `len` bytes plus its terminator without
    /// buffering it.
    ///
    /// Returns whether the terminator was CRLF.
    pub async fn discard_payload(&mut self, len: usize) -> Result<bool, ConnectionError> {
        let mut remaining = len;
        while remaining > 0 {
            if self.buffer.is_empty() && !self.read_more_data().await? {
                return Err(ConnectionError::UnexpectedEof);
            }
            let take = remaining.min(self.buffer.len());
            self.buffer.advance(take);
            remaining -= take;
        }

        while self.buffer.len() < CRLF.len() {
            if !self.read_more_data().await? {
                return Err(ConnectionError::UnexpectedEof);
            }
        }
        let terminated = &self.buffer[..CRLF.len()] == CRLF;
        self.buffer.advance(CRLF.len());
        Ok(terminated)
    }

    /// Queues a response. Nothing reaches the client until [`flush`](Self::flush).
    pub async fn write_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stats.record_written(bytes.len());
        trace!(bytes = bytes.len(), response = %response, "Queued response");
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), ConnectionError> {
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads from the socket into the buffer. Returns false on end of stream.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Ok(false);
        }

        self.stats.record_read(n);
        trace!(bytes = n, "Read data");
        Ok(true)
    }
}

/// Builds a connection over an in-memory pipe, returning the client end.
#[cfg(test)]
pub(crate) fn test_pair() -> (Connection, tokio::io::DuplexStream) {
    let (server, client) = tokio::io::duplex(64 * 1024);
    (
        Connection::new(server, Arc::new(ConnectionStats::new())),
        client,
    )
}

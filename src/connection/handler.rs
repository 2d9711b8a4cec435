//! Connection Worker
//!
//! A [`ConnectionHandler`] owns one client for its whole life. It reads a
//! command line, hands it to the [`Dispatcher`], answers `ERROR` when no
//! handler claims the verb, and flushes whatever the handlers queued:
//!
//! ```text
//! read_line ─> route ─┬─> (handlers wrote replies) ─┐
//!     ▲               └─> ERROR ────────────────────┤
//!     └──────────────────── flush <─────────────────┘
//! ```
//!
//! The loop ends when the client hangs up, on a transport error, or when the
//! server aborts the task during shutdown. Dropping the handler closes the
//! socket and updates [`ConnectionStats`].

use crate::commands::Dispatcher;
use crate::connection::stats::ConnectionStats;
use crate::connection::stream::{AsyncStream, Connection};
use crate::protocol::{ParseError, Response};
use crate::storage::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// The worker for one client.
pub struct ConnectionHandler {
    conn: Connection,
    /// Peer address, used as the `client` log field
    addr: SocketAddr,
    cache: Arc<Cache>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Wraps an accepted stream. The connection counts as open from here
    /// until the handler is dropped.
    pub fn new(
        stream: impl AsyncStream + 'static,
        addr: SocketAddr,
        cache: Arc<Cache>,
        dispatcher: Arc<Dispatcher>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.opened();

        Self {
            conn: Connection::new(stream, Arc::clone(&stats)),
            addr,
            cache,
            dispatcher,
            stats,
        }
    }

    /// Serves the client until it disconnects.
    ///
    /// A hang-up between commands is `Ok(())`; anything else is returned
    /// after being logged.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let outcome = self.serve().await;
        match &outcome {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::UnexpectedEof) => {
                debug!(client = %self.addr, "Client left in the middle of a command")
            }
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "Client reset the connection")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Closing connection"),
        }
        outcome
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            let line = match self.conn.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(ConnectionError::Parse(ParseError::InvalidUtf8)) => {
                    warn!(client = %self.addr, "Command line is not valid UTF-8");
                    self.conn.write_response(&Response::Error).await?;
                    self.conn.flush().await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            trace!(client = %self.addr, line = %line, "Received command");
            self.stats.record_command();

            let routed = self
                .dispatcher
                .route(&line, &self.cache, &mut self.conn)
                .await?;
            if !routed {
                self.conn.write_response(&Response::Error).await?;
            }

            self.conn.flush().await?;
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.stats.closed();
    }
}

/// Why a worker stopped serving its client.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input: {0}")]
    Parse(#[from] ParseError),

    /// The stream ended inside a command line or data block
    #[error("stream closed mid-frame")]
    UnexpectedEof,
}

/// Runs a [`ConnectionHandler`] for `stream` to completion.
///
/// This is what the server spawns for every accepted socket.
pub async fn handle_connection(
    stream: impl AsyncStream + 'static,
    addr: SocketAddr,
    cache: Arc<Cache>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, cache, dispatcher, stats);
    // run() already logged the outcome
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    struct Harness {
        addr: SocketAddr,
        cache: Arc<Cache>,
        stats: Arc<ConnectionStats>,
    }

    /// Serves every accepted socket with `handle_connection`.
    async fn serve() -> Harness {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let harness = Harness {
            addr: listener.local_addr().unwrap(),
            cache: Arc::new(Cache::with_capacity(1024 * 1024)),
            stats: Arc::new(ConnectionStats::new()),
        };

        let cache = Arc::clone(&harness.cache);
        let stats = Arc::clone(&harness.stats);
        let dispatcher = Arc::new(Dispatcher::standard());
        tokio::spawn(async move {
            while let Ok((socket, peer)) = listener.accept().await {
                tokio::spawn(handle_connection(
                    socket,
                    peer,
                    Arc::clone(&cache),
                    Arc::clone(&dispatcher),
                    Arc::clone(&stats),
                ));
            }
        });
        harness
    }

    async fn expect(client: &mut TcpStream, expected: &str) {
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_set_get() {
        let harness = serve().await;
        let mut client = TcpStream::connect(harness.addr).await.unwrap();

        client.write_all(b"set name 0 0 4\r\nAriz\r\n").await.unwrap();
        expect(&mut client, "STORED\r\n").await;

        client.write_all(b"get name\r\n").await.unwrap();
        expect(&mut client, "VALUE name 0 4\r\nAriz\r\nEND\r\n").await;
    }

    #[tokio::test]
    async fn test_unknown_and_blank_lines() {
        let harness = serve().await;
        let mut client = TcpStream::connect(harness.addr).await.unwrap();

        client.write_all(b"flush_all\r\n\r\n").await.unwrap();
        expect(&mut client, "ERROR\r\nERROR\r\n").await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_connection() {
        let harness = serve().await;
        let mut client = TcpStream::connect(harness.addr).await.unwrap();

        client.write_all(b"get \xff\xfe\r\nget k\r\n").await.unwrap();
        expect(&mut client, "ERROR\r\nEND\r\n").await;
    }

    #[tokio::test]
    async fn test_pipelined_commands() {
        let harness = serve().await;
        let mut client = TcpStream::connect(harness.addr).await.unwrap();

        client
            .write_all(b"set k1 0 0 2\r\nv1\r\nset k2 0 0 2\r\nv2\r\nget k1 k2\r\n")
            .await
            .unwrap();
        expect(
            &mut client,
            "STORED\r\nSTORED\r\nVALUE k1 0 2\r\nv1\r\nVALUE k2 0 2\r\nv2\r\nEND\r\n",
        )
        .await;
        assert_eq!(harness.cache.len(), 2);
    }

    #[tokio::test]
    async fn test_stats_follow_the_client() {
        let harness = serve().await;
        assert_eq!(harness.stats.snapshot().active, 0);

        let mut client = TcpStream::connect(harness.addr).await.unwrap();
        client.write_all(b"get k\r\n").await.unwrap();
        expect(&mut client, "END\r\n").await;

        let snap = harness.stats.snapshot();
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.active, 1);
        assert_eq!(snap.commands, 1);
        assert_eq!(snap.bytes_in, 7);
        assert_eq!(snap.bytes_out, 5);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.stats.snapshot().active, 0);
    }

    #[tokio::test]
    async fn test_handler_over_duplex() {
        let (server, mut client) = tokio::io::duplex(4096);
        let cache = Arc::new(Cache::with_capacity(1024));
        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            server,
            "127.0.0.1:1".parse().unwrap(),
            Arc::clone(&cache),
            Arc::new(Dispatcher::standard()),
            Arc::clone(&stats),
        );
        let worker = tokio::spawn(handler.run());

        client
            .write_all(b"set n 0 0 1\r\n5\r\nincr n 3\r\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "STORED\r\n8\r\n");

        assert!(worker.await.unwrap().is_ok());
        let snap = stats.snapshot();
        assert_eq!(snap.active, 0);
        assert_eq!(snap.commands, 2);
    }

    #[tokio::test]
    async fn test_eof_mid_command() {
        let (server, mut client) = tokio::io::duplex(4096);
        let handler = ConnectionHandler::new(
            server,
            "127.0.0.1:1".parse().unwrap(),
            Arc::new(Cache::with_capacity(1024)),
            Arc::new(Dispatcher::standard()),
            Arc::new(ConnectionStats::new()),
        );
        let worker = tokio::spawn(handler.run());

        client.write_all(b"set n 0 0 5\r\nab").await.unwrap();
        client.shutdown().await.unwrap();

        let result = worker.await.unwrap();
        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
    }
}

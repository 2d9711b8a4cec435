//! Client Connections
//!
//! - [`stream`]: the framed [`Connection`] (line and data-block reads,
//!   buffered replies) over any [`AsyncStream`]
//! - [`handler`]: the worker loop that feeds lines to the dispatcher
//! - [`stats`]: lock-free counters shared by all workers
//!
//! The server spawns one worker task per accepted socket, so a slow client
//! only ever stalls itself. Pipelined commands are served in order from the
//! same read buffer.

pub mod handler;
pub mod stats;
pub mod stream;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
pub use stats::{ConnectionStats, StatsSnapshot};
pub use stream::{AsyncStream, Connection};

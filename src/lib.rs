//! # flashcached - An In-Memory Cache Server Speaking the Memcached Protocol
//!
//! flashcached is an in-memory key-value cache written in Rust. Clients talk
//! to it over TCP with the memcached text protocol; the server keeps values
//! within a byte budget and evicts the least recently used data when full.
//!
//! ## Features
//!
//! - **Memcached-Compatible**: Storage, retrieval, arithmetic, delete and touch commands
//! - **Bounded Memory**: Byte capacity with LRU eviction
//! - **Expiry**: Relative or absolute `exptime`, cleaned lazily on access
//! - **Optimistic Concurrency**: `gets`/`cas` with a cache-wide version counter
//! - **Async I/O**: Built on Tokio, one task per client connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             flashcached                                 │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│ Dispatcher  │                  │
//! │  │ (accept)    │    │  Handler    │    │             │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │  Protocol   │    │  Command Handlers                            │    │
//! │  │  framing &  │    │  update · retrieval · arith · delete · touch │    │
//! │  │  responses  │    └───────────────────────┬──────────────────────┘    │
//! │  └─────────────┘                            │                           │
//! │                                             ▼                           │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │  Cache: Mutex<entries + LRU + deadline>      │    │
//! │                     └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use flashcached::config::ServerConfig;
//! use flashcached::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut server = Server::new(ServerConfig::default());
//!     server.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `set|add|replace|append|prepend <key> <flags> <exptime> <bytes> [noreply]`
//! - `cas <key> <flags> <exptime> <bytes> <cas unique> [noreply]`
//! - `get|gets <key>*`
//! - `incr|decr <key> <delta> [noreply]`
//! - `delete <key> [noreply]`
//! - `touch <key> <exptime> [noreply]`
//!
//! ## Module Overview
//!
//! - [`storage`]: The bounded LRU cache with lazy expiry
//! - [`protocol`]: Line framing, argument parsing and response encoding
//! - [`commands`]: The dispatch table and one handler per command family
//! - [`connection`]: Per-client framing and the worker loop
//! - [`server`]: Listener, worker tracking and shutdown
//! - [`config`]: Cache and server settings
//!
//! ## Design Highlights
//!
//! ### One Lock
//!
//! The cache sits behind a single mutex. LRU order and the cas counter are
//! cache-wide, and compound commands such as `cas` or `append` check and write
//! under the same lock acquisition.
//!
//! ### Lazy Expiry
//!
//! There is no sweeper task. The cache tracks its earliest expiration and
//! only scans for expired entries once the clock has passed it.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::Dispatcher;
pub use config::{CacheConfig, ServerConfig};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, Response};
pub use server::Server;
pub use storage::{Cache, CacheError};

/// The default port flashcached listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host flashcached binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of flashcached
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Command Handler Module
//!
//! This module implements the command processing layer. A command line is
//! split into a verb and argument tokens, the [`Dispatcher`] looks up the
//! handlers registered for the verb, and each handler runs the command against
//! the shared cache and writes its replies to the client connection.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Connection      │  (connection module)
//! │  read_line      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────────────────────┐
//! │  Dispatcher     │─────>│ CommandHandler (per family)     │
//! │  verb ─> [h..]  │      │  - Validate arguments           │
//! └─────────────────┘      │  - Read data block (updates)    │
//!                          │  - Execute against Cache        │
//!                          │  - Write response(s)            │
//!                          └────────────────┬────────────────┘
//!                                           │
//!                                           ▼
//!                                  ┌─────────────────┐
//!                                  │ Cache           │  (storage module)
//!                                  └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Update Commands
//! - `set`, `add`, `replace`, `append`, `prepend`, `cas`
//!
//! ### Retrieval Commands
//! - `get`, `gets`
//!
//! ### Other Commands
//! - `incr`, `decr`
//! - `delete`
//! - `touch`
//!
//! Every command except retrieval accepts a trailing `noreply`, which
//! suppresses all of its replies.

pub mod arith;
pub mod delete;
pub mod dispatcher;
pub mod retrieval;
pub mod touch;
pub mod update;

pub use dispatcher::{DispatchError, Dispatcher};

use crate::connection::{Connection, ConnectionError};
use crate::protocol::{messages, Response};
use crate::storage::{Cache, CacheError};
use std::future::Future;
use std::pin::Pin;

/// The future a handler returns for one invocation.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ConnectionError>> + Send + 'a>>;

/// Everything a handler needs to run one command.
pub struct Context<'a> {
    /// Tokens after the verb
    pub args: &'a [&'a str],
    pub cache: &'a Cache,
    /// The requesting client; data blocks are read from and replies written to it
    pub conn: &'a mut Connection,
}

impl Context<'_> {
    /// Queues `response` unless the command asked for `noreply`.
    pub async fn reply(&mut self, response: Response, noreply: bool) -> Result<(), ConnectionError> {
        if noreply {
            return Ok(());
        }
        self.conn.write_response(&response).await
    }
}

/// A handler for one family of commands.
///
/// Handlers only fail on transport errors. Every command-level failure is
/// written to the client as a response.
pub trait CommandHandler: Send + Sync {
    fn call<'a>(&'a self, verb: &'a str, ctx: Context<'a>) -> HandlerFuture<'a>;
}

/// Translates a cache error into its client-facing response.
pub(crate) fn cache_error_response(error: &CacheError) -> Response {
    match error {
        CacheError::ValueTooLarge { .. } => Response::client_error(messages::OBJECT_TOO_LARGE),
        CacheError::NotFound => Response::NotFound,
        CacheError::NonNumeric => Response::client_error(messages::NON_NUMERIC_VALUE),
        CacheError::Overflow => Response::client_error(messages::DELTA_OVERFLOW),
    }
}

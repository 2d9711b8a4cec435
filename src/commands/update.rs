//! Update Commands
//!
//! ```text
//! set|add|replace|append|prepend <key> <flags> <exptime> <bytes> [noreply]\r\n
//! cas <key> <flags> <exptime> <bytes> <cas unique> [noreply]\r\n
//! <data block>\r\n
//! ```
//!
//! Once the command line parses, the data block is always consumed, even when
//! the store is refused, so the next command starts at a line boundary.

use crate::commands::{cache_error_response, CommandHandler, Context, HandlerFuture};
use crate::connection::ConnectionError;
use crate::protocol::{is_noreply, messages, parse_number, ParseError, ParseResult, Response};
use crate::storage::{StoreMode, StoreOutcome};
use bytes::Bytes;
use tracing::debug;

pub const VERBS: &[&str] = &["set", "add", "replace", "append", "prepend", "cas"];

/// Handles the storage commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateHandler;

/// A parsed update command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header<'a> {
    key: &'a str,
    flags: u32,
    exptime: i64,
    bytes: usize,
    cas: Option<u64>,
}

impl<'a> Header<'a> {
    /// Number of tokens before the optional `noreply`.
    fn arity(verb: &str) -> usize {
        if verb == "cas" {
            5
        } else {
            4
        }
    }

    fn parse(verb: &str, args: &[&'a str]) -> ParseResult<Self> {
        if args.len() < Self::arity(verb) {
            let missing = if args.len() == 4 { "cas unique" } else { "bytes" };
            return Err(ParseError::MissingArgument(missing));
        }

        Ok(Self {
            key: args[0],
            flags: parse_number(args[1])?,
            exptime: parse_number(args[2])?,
            bytes: parse_number(args[3])?,
            cas: if verb == "cas" {
                Some(parse_number(args[4])?)
            } else {
                None
            },
        })
    }

    fn mode(&self, verb: &str) -> Option<StoreMode> {
        match verb {
            "set" => Some(StoreMode::Set),
            "add" => Some(StoreMode::Add),
            "replace" => Some(StoreMode::Replace),
            "append" => Some(StoreMode::Append),
            "prepend" => Some(StoreMode::Prepend),
            "cas" => self.cas.map(StoreMode::Cas),
            _ => None,
        }
    }
}

impl UpdateHandler {
    async fn handle(&self, verb: &str, mut ctx: Context<'_>) -> Result<(), ConnectionError> {
        let args = ctx.args;
        let noreply = is_noreply(args, Header::arity(verb));

        let header = match Header::parse(verb, args) {
            Ok(header) => header,
            Err(ParseError::MissingArgument(_)) => return ctx.reply(Response::Error, false).await,
            Err(e) => {
                debug!(verb, error = %e, "Bad update command line");
                return ctx
                    .reply(Response::client_error(messages::BAD_COMMAND_LINE), noreply)
                    .await;
            }
        };

        // Oversized blocks are skipped rather than buffered
        if header.bytes > ctx.cache.max_value_size() {
            let terminated = ctx.conn.discard_payload(header.bytes).await?;
            let message = if terminated {
                messages::OBJECT_TOO_LARGE
            } else {
                messages::BAD_DATA_CHUNK
            };
            return ctx.reply(Response::client_error(message), noreply).await;
        }

        let data = match ctx.conn.read_payload(header.bytes).await {
            Ok(data) => data,
            Err(ConnectionError::Parse(ParseError::BadDataChunk)) => {
                return ctx
                    .reply(Response::client_error(messages::BAD_DATA_CHUNK), noreply)
                    .await;
            }
            Err(e) => return Err(e),
        };

        let Some(mode) = header.mode(verb) else {
            return ctx.reply(Response::Error, noreply).await;
        };

        let expiration = ctx.cache.expiration(header.exptime);
        let key = Bytes::copy_from_slice(header.key.as_bytes());
        let response = match ctx.cache.store(mode, key, data, header.flags, expiration) {
            Ok(StoreOutcome::Stored) => Response::Stored,
            Ok(StoreOutcome::NotStored) => Response::NotStored,
            Ok(StoreOutcome::Exists) => Response::Exists,
            Ok(StoreOutcome::NotFound) => Response::NotFound,
            Err(e) => cache_error_response(&e),
        };
        ctx.reply(response, noreply).await
    }
}

impl CommandHandler for UpdateHandler {
    fn call<'a>(&'a self, verb: &'a str, ctx: Context<'a>) -> HandlerFuture<'a> {
        Box::pin(self.handle(verb, ctx))
    }
}

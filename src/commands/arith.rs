//! Increment and Decrement
//!
//! ```text
//! incr <key> <delta> [noreply]\r\n
//! decr <key> <delta> [noreply]\r\n
//! ```
//!
//! The stored value must be a decimal integer. The reply is the new value on
//! a line of its own. Results may go negative.

use crate::commands::{cache_error_response, CommandHandler, Context, HandlerFuture};
use crate::connection::ConnectionError;
use crate::protocol::{is_noreply, messages, parse_number, Response};

pub const VERBS: &[&str] = &["incr", "decr"];

#[derive(Debug, Default, Clone, Copy)]
pub struct ArithHandler;

impl ArithHandler {
    async fn handle(&self, verb: &str, mut ctx: Context<'_>) -> Result<(), ConnectionError> {
        let args = ctx.args;
        let noreply = is_noreply(args, 2);

        let [key, delta, ..] = args else {
            return ctx.reply(Response::Error, noreply).await;
        };

        if !ctx.cache.exists(key.as_bytes()) {
            return ctx.reply(Response::NotFound, noreply).await;
        }

        let Ok(delta) = parse_number::<i64>(delta) else {
            return ctx
                .reply(Response::client_error(messages::INVALID_DELTA), noreply)
                .await;
        };

        let delta = if verb == "decr" {
            delta.checked_neg()
        } else {
            Some(delta)
        };
        let Some(delta) = delta else {
            return ctx
                .reply(Response::client_error(messages::DELTA_OVERFLOW), noreply)
                .await;
        };

        let response = match ctx.cache.incr(key.as_bytes(), delta) {
            Ok(value) => Response::Number(value),
            Err(e) => cache_error_response(&e),
        };
        ctx.reply(response, noreply).await
    }
}

impl CommandHandler for ArithHandler {
    fn call<'a>(&'a self, verb: &'a str, ctx: Context<'a>) -> HandlerFuture<'a> {
        Box::pin(self.handle(verb, ctx))
    }
}

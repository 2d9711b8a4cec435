//! `touch <key> <exptime> [noreply]\r\n`
//!
//! Updates only the expiration of an existing key.

use crate::commands::{CommandHandler, Context, HandlerFuture};
use crate::connection::ConnectionError;
use crate::protocol::{is_noreply, messages, parse_number, Response};

pub const VERBS: &[&str] = &["touch"];

#[derive(Debug, Default, Clone, Copy)]
pub struct TouchHandler;

impl TouchHandler {
    async fn handle(&self, mut ctx: Context<'_>) -> Result<(), ConnectionError> {
        let args = ctx.args;
        let noreply = is_noreply(args, 2);

        let [key, exptime, ..] = args else {
            return ctx.reply(Response::Error, noreply).await;
        };

        if !ctx.cache.exists(key.as_bytes()) {
            return ctx.reply(Response::NotFound, noreply).await;
        }

        let Ok(exptime) = parse_number::<i64>(exptime) else {
            return ctx
                .reply(Response::client_error(messages::INVALID_EXPTIME), noreply)
                .await;
        };

        let expiration = ctx.cache.expiration(exptime);
        let response = if ctx.cache.touch(key.as_bytes(), expiration) {
            Response::Touched
        } else {
            Response::NotFound
        };
        ctx.reply(response, noreply).await
    }
}

impl CommandHandler for TouchHandler {
    fn call<'a>(&'a self, _verb: &'a str, ctx: Context<'a>) -> HandlerFuture<'a> {
        Box::pin(self.handle(ctx))
    }
}

//! `delete <key> [noreply]\r\n`

use crate::commands::{CommandHandler, Context, HandlerFuture};
use crate::connection::ConnectionError;
use crate::protocol::{is_noreply, Response};

pub const VERBS: &[&str] = &["delete"];

#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteHandler;

impl DeleteHandler {
    async fn handle(&self, mut ctx: Context<'_>) -> Result<(), ConnectionError> {
        let args = ctx.args;
        let noreply = is_noreply(args, 1);

        let Some(key) = args.first() else {
            return ctx.reply(Response::Error, false).await;
        };

        let response = if ctx.cache.delete(key.as_bytes()) {
            Response::Deleted
        } else {
            Response::NotFound
        };
        ctx.reply(response, noreply).await
    }
}

impl CommandHandler for DeleteHandler {
    fn call<'a>(&'a self, _verb: &'a str, ctx: Context<'a>) -> HandlerFuture<'a> {
        Box::pin(self.handle(ctx))
    }
}

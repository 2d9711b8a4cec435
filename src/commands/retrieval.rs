//! Retrieval Commands
//!
//! ```text
//! get <key>*\r\n
//! gets <key>*\r\n
//! ```
//!
//! Each hit is sent as `VALUE <key> <flags> <bytes>[ <cas>]` followed by its
//! data block; misses are skipped. The reply always ends with `END`.

use crate::commands::{CommandHandler, Context, HandlerFuture};
use crate::connection::ConnectionError;
use crate::protocol::Response;

pub const VERBS: &[&str] = &["get", "gets"];

#[derive(Debug, Default, Clone, Copy)]
pub struct RetrievalHandler;

impl RetrievalHandler {
    async fn handle(&self, verb: &str, mut ctx: Context<'_>) -> Result<(), ConnectionError> {
        let keys = ctx.args;
        if keys.is_empty() {
            return ctx.reply(Response::Error, false).await;
        }

        let with_cas = verb == "gets";
        for key in keys {
            if let Some(entry) = ctx.cache.get(key.as_bytes()) {
                let cas = with_cas.then_some(entry.cas);
                ctx.reply(Response::value(*key, entry.flags, entry.value, cas), false)
                    .await?;
            }
        }

        ctx.reply(Response::End, false).await
    }
}

impl CommandHandler for RetrievalHandler {
    fn call<'a>(&'a self, verb: &'a str, ctx: Context<'a>) -> HandlerFuture<'a> {
        Box::pin(self.handle(verb, ctx))
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::exchange;
    use crate::storage::Cache;
    use bytes::Bytes;

    fn seeded() -> Cache {
        let cache = Cache::with_capacity(1024);
        cache
            .set(Bytes::from("a"), Some(Bytes::from("one")), Some(1), None)
            .unwrap();
        cache
            .set(Bytes::from("b"), Some(Bytes::from("two")), Some(2), None)
            .unwrap();
        cache
    }

    #[tokio::test]
    async fn test_get_single() {
        let cache = seeded();
        assert_eq!(
            exchange(&cache, "get a", b"").await,
            "VALUE a 1 3\r\none\r\nEND\r\n"
        );
    }

    #[tokio::test]
    async fn test_get_miss() {
        let cache = seeded();
        assert_eq!(exchange(&cache, "get zzz", b"").await, "END\r\n");
    }

    #[tokio::test]
    async fn test_get_multiple_skips_misses() {
        let cache = seeded();
        assert_eq!(
            exchange(&cache, "get a missing b", b"").await,
            "VALUE a 1 3\r\none\r\nVALUE b 2 3\r\ntwo\r\nEND\r\n"
        );
    }

    #[tokio::test]
    async fn test_gets_includes_cas() {
        let cache = seeded();
        assert_eq!(
            exchange(&cache, "gets a b", b"").await,
            "VALUE a 1 3 1\r\none\r\nVALUE b 2 3 2\r\ntwo\r\nEND\r\n"
        );
    }

    #[tokio::test]
    async fn test_get_without_keys() {
        let cache = seeded();
        assert_eq!(exchange(&cache, "get", b"").await, "ERROR\r\n");
        assert_eq!(exchange(&cache, "gets", b"").await, "ERROR\r\n");
    }

    #[tokio::test]
    async fn test_get_promotes() {
        let cache = seeded();
        exchange(&cache, "get a", b"").await;
        assert_eq!(cache.keys(), vec![Bytes::from("b"), Bytes::from("a")]);
    }
}

//! Verb Dispatch
//!
//! The dispatch table is built once at startup and shared by every
//! connection. A verb may have several handlers; they run in registration
//! order against the same connection.

use crate::commands::{arith, delete, retrieval, touch, update, CommandHandler, Context};
use crate::connection::{Connection, ConnectionError};
use crate::protocol::split_command;
use crate::storage::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from building a dispatch table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("a handler must be registered for at least one verb")]
    NoVerbs,
}

/// Maps command verbs to their handlers.
#[derive(Default)]
pub struct Dispatcher {
    routes: HashMap<String, Vec<Arc<dyn CommandHandler>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut verbs: Vec<_> = self.routes.keys().collect();
        verbs.sort();
        f.debug_struct("Dispatcher").field("verbs", &verbs).finish()
    }
}

impl Dispatcher {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table the server uses: one handler per command family.
    pub fn standard() -> Self {
        let mut dispatcher = Self::new();
        let families: [(&[&str], Arc<dyn CommandHandler>); 5] = [
            (update::VERBS, Arc::new(update::UpdateHandler)),
            (retrieval::VERBS, Arc::new(retrieval::RetrievalHandler)),
            (arith::VERBS, Arc::new(arith::ArithHandler)),
            (delete::VERBS, Arc::new(delete::DeleteHandler)),
            (touch::VERBS, Arc::new(touch::TouchHandler)),
        ];
        for (verbs, handler) in families {
            // VERBS are non-empty constants
            let _ = dispatcher.register(verbs, handler);
        }
        dispatcher
    }

    /// Associates `handler` with every verb in `verbs`.
    pub fn register(
        &mut self,
        verbs: &[&str],
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), DispatchError> {
        if verbs.is_empty() {
            return Err(DispatchError::NoVerbs);
        }
        for verb in verbs {
            self.routes
                .entry((*verb).to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
        Ok(())
    }

    /// Runs every handler registered for the line's verb.
    ///
    /// Returns false, without touching the connection, when the verb has no
    /// handler or the line is blank.
    pub async fn route(
        &self,
        line: &str,
        cache: &Cache,
        conn: &mut Connection,
    ) -> Result<bool, ConnectionError> {
        let Some((verb, args)) = split_command(line) else {
            return Ok(false);
        };
        let Some(handlers) = self.routes.get(verb) else {
            debug!(verb, "Unknown command");
            return Ok(false);
        };

        for handler in handlers {
            let ctx = Context {
                args: &args,
                cache,
                conn: &mut *conn,
            };
            handler.call(verb, ctx).await?;
        }
        Ok(true)
    }

    /// Returns true if the line's verb has at least one handler.
    pub fn routable(&self, line: &str) -> bool {
        split_command(line).is_some_and(|(verb, _)| self.routes.contains_key(verb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::HandlerFuture;
    use crate::connection::stream::test_pair;
    use crate::protocol::Response;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;

    /// Records calls and answers with the number of arguments.
    struct Recorder {
        calls: AtomicUsize,
    }

    impl CommandHandler for Recorder {
        fn call<'a>(&'a self, _verb: &'a str, mut ctx: Context<'a>) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let n = ctx.args.len() as i64;
                ctx.reply(Response::Number(n), false).await
            })
        }
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_register_requires_verbs() {
        let mut dispatcher = Dispatcher::new();
        assert_eq!(
            dispatcher.register(&[], recorder()),
            Err(DispatchError::NoVerbs)
        );
        assert!(dispatcher.register(&["ping"], recorder()).is_ok());
    }

    #[test]
    fn test_routable() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(&["a", "b"], recorder()).unwrap();

        assert!(dispatcher.routable("a x y"));
        assert!(dispatcher.routable("b"));
        assert!(!dispatcher.routable("c"));
        assert!(!dispatcher.routable(""));
        assert!(!dispatcher.routable("A"));
    }

    #[test]
    fn test_standard_verbs() {
        let dispatcher = Dispatcher::standard();
        for verb in [
            "set", "add", "replace", "append", "prepend", "cas", "get", "gets", "incr", "decr",
            "delete", "touch",
        ] {
            assert!(dispatcher.routable(verb), "{} should be routable", verb);
        }
        assert!(!dispatcher.routable("flush_all"));
    }

    #[tokio::test]
    async fn test_route_calls_every_handler_in_order() {
        let first = recorder();
        let second = recorder();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(&["ping"], first.clone()).unwrap();
        dispatcher.register(&["ping", "pong"], second.clone()).unwrap();

        let cache = Cache::with_capacity(64);
        let (mut conn, mut client) = test_pair();

        assert!(dispatcher.route("ping 1 2", &cache, &mut conn).await.unwrap());
        assert!(dispatcher.route("pong", &cache, &mut conn).await.unwrap());
        conn.flush().await.unwrap();
        drop(conn);

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 2);

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "2\r\n2\r\n0\r\n");
    }

    #[tokio::test]
    async fn test_route_unknown_verb() {
        let dispatcher = Dispatcher::standard();
        let cache = Cache::with_capacity(64);
        let (mut conn, mut client) = test_pair();

        assert!(!dispatcher.route("bogus k", &cache, &mut conn).await.unwrap());
        assert!(!dispatcher.route("   ", &cache, &mut conn).await.unwrap());
        conn.flush().await.unwrap();
        drop(conn);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }
}

//! TCP Server
//!
//! [`Server`] owns the shared cache, the dispatch table and the accept loop.
//!
//! ## Lifecycle
//!
//! ```text
//! start()                                   stop()
//!   │ bind, record local address              │ signal accept loop (watch)
//!   ▼                                         ▼
//! ┌───────────────────────────┐   ┌──────────────────────────────┐
//! │ accept loop               │   │ take one racing connection,  │
//! │  accept ─> spawn worker   │──>│ waiting at most the grace    │
//! │  (JoinSet<()>)            │   │ window, then drop listener   │
//! └───────────────────────────┘   │ and hand back the JoinSet    │
//!                                 └──────────────┬───────────────┘
//!                                                │
//!                                                ▼
//!                                 abort every worker (closes its
//!                                 socket) and wait for each to exit
//! ```

use crate::commands::Dispatcher;
use crate::config::{CacheConfig, ServerConfig};
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::Cache;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// How long a stopping server waits for a connection that raced the stop
/// request.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// State that only exists while the server is online.
struct Running {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<JoinSet<()>>,
}

/// A memcached-protocol server.
///
/// # Example
///
/// ```no_run
/// use flashcached::config::ServerConfig;
/// use flashcached::server::Server;
///
/// # async fn run() -> std::io::Result<()> {
/// let mut server = Server::new(ServerConfig {
///     port: 0,
///     ..ServerConfig::default()
/// });
/// let addr = server.start().await?;
/// println!("listening on {}", addr);
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    config: ServerConfig,
    cache: Arc<Cache>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ConnectionStats>,
    running: Option<Running>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Server {
    /// Creates a server with a fresh cache sized by `config.cache`.
    pub fn new(config: ServerConfig) -> Self {
        let cache = Arc::new(Cache::new(config.cache));
        Self::with_cache(config, cache)
    }

    /// Creates a server around an existing cache.
    ///
    /// `config.cache` is replaced by the sizing of `cache`.
    pub fn with_cache(mut config: ServerConfig, cache: Arc<Cache>) -> Self {
        config.cache = CacheConfig::new(cache.capacity(), cache.max_value_size());
        Self {
            config,
            cache,
            dispatcher: Arc::new(Dispatcher::standard()),
            stats: Arc::new(ConnectionStats::new()),
            running: None,
        }
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Returns the bound address; with port 0 this is where the ephemeral
    /// port can be read. Starting a running server is a no-op.
    pub async fn start(&mut self) -> io::Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr);
        }

        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.cache),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.stats),
            shutdown_rx,
        ));

        info!(addr = %local_addr, "Listening");
        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Stops accepting, closes every client connection and waits for the
    /// workers to exit. Stopping a stopped server is a no-op.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        info!("Shutting down");
        let _ = running.shutdown_tx.send(true);

        let mut workers = match running.accept_task.await {
            Ok(workers) => workers,
            Err(e) => {
                error!(error = %e, "Accept loop failed");
                return;
            }
        };

        debug!(workers = workers.len(), "Closing client connections");
        workers.abort_all();
        while workers.join_next().await.is_some() {}

        info!("Server stopped");
    }

    /// True between a successful [`start`](Self::start) and [`stop`](Self::stop).
    pub fn is_online(&self) -> bool {
        self.running.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// The port actually bound, once started.
    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Dropping the worker set with the accept task aborts every worker
        if let Some(running) = self.running.take() {
            running.accept_task.abort();
        }
    }
}

/// Accepts connections until told to stop, then returns the worker set.
async fn accept_loop(
    listener: TcpListener,
    cache: Arc<Cache>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ConnectionStats>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinSet<()> {
    let mut workers = JoinSet::new();
    let spawn = |workers: &mut JoinSet<()>, stream: TcpStream, addr: SocketAddr| {
        workers.spawn(handle_connection(
            stream,
            addr,
            Arc::clone(&cache),
            Arc::clone(&dispatcher),
            Arc::clone(&stats),
        ));
    };

    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, addr)) => spawn(&mut workers, stream, addr),
                Err(e) => error!(error = %e, "Failed to accept connection"),
            },
            _ = shutdown.changed() => break,
        }

        // Reap workers whose clients already left
        while workers.try_join_next().is_some() {}
    }

    // A client whose connect raced the stop request still gets a worker,
    // which stop() then closes along with the rest
    match tokio::time::timeout(SHUTDOWN_GRACE, listener.accept()).await {
        Ok(Ok((stream, addr))) => spawn(&mut workers, stream, addr),
        Ok(Err(e)) => error!(error = %e, "Failed to accept connection"),
        Err(_) => {}
    }

    workers
}

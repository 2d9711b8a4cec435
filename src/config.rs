//! Configuration Module
//!
//! Construction-time settings for the cache and the server. Everything has a
//! default; the binary overrides fields from its command line.

use crate::{DEFAULT_HOST, DEFAULT_PORT};

/// Default capacity of a standalone [`Cache`](crate::storage::Cache): 1 MiB.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024 * 1024;

/// Default capacity of the cache owned by a [`Server`](crate::server::Server): 512 MiB.
pub const DEFAULT_SERVER_CAPACITY: usize = 512 * 1024 * 1024;

/// Cache sizing.
///
/// `max_value_size` is always clamped to `capacity`, so a single value can
/// never exceed the whole budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    capacity: usize,
    max_value_size: usize,
}

impl CacheConfig {
    pub fn new(capacity: usize, max_value_size: usize) -> Self {
        Self {
            capacity,
            max_value_size: max_value_size.min(capacity),
        }
    }

    /// A config whose largest value may fill the whole cache.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind; 0 picks an ephemeral port
    pub port: u16,
    /// Sizing for the cache [`Server::new`](crate::server::Server::new)
    /// creates. A server built around an existing cache overwrites it with
    /// that cache's settings.
    pub cache: CacheConfig,
}

impl ServerConfig {
    /// The `host:port` string handed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cache: CacheConfig::with_capacity(DEFAULT_SERVER_CAPACITY),
        }
    }
}

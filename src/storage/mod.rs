//! Storage Module
//!
//! The cache every connection shares: a byte-bounded key-value map with LRU
//! eviction, lazy expiration and cas versioning.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Cache                              │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                 Mutex<CacheState>                     │  │
//! │  │   entries ── recency (LRU order) ── deadline ── cas   │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!              ▲                                ▲
//!              │ now()                          │ Expiration
//!        ┌─────┴─────┐                   ┌──────┴──────┐
//!        │   Clock   │                   │   expiry    │
//!        └───────────┘                   └─────────────┘
//! ```
//!
//! ## Features
//!
//! - **Byte Budget**: Sum of value sizes never exceeds the capacity
//! - **LRU Eviction**: Reads and writes promote; eviction takes the oldest
//! - **Lazy Expiry**: Expired keys are cleaned during normal accesses
//! - **CAS**: One counter per cache, bumped by every write
//!
//! ## Example
//!
//! ```
//! use flashcached::storage::{Cache, StoreMode, StoreOutcome};
//! use bytes::Bytes;
//!
//! let cache = Cache::with_capacity(1024);
//!
//! let outcome = cache
//!     .store(StoreMode::Add, Bytes::from("counter"), Bytes::from("5"), 0, cache.expiration(0))
//!     .unwrap();
//! assert_eq!(outcome, StoreOutcome::Stored);
//!
//! assert_eq!(cache.incr(b"counter", 3), Ok(8));
//! ```

pub mod clock;
pub mod engine;
pub mod expiry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Cache, CacheError, CacheStats, EntryView, StoreMode, StoreOutcome};
pub use expiry::{Deadline, Expiration, RELATIVE_EXPTIME_LIMIT};

//! Expiration Times
//!
//! Clients send `exptime` as a signed integer with three meanings:
//!
//! ```text
//!   exptime == 0                 never expires
//!   exptime <  0                 already expired
//!   0 < exptime <  30 days       relative: expires `exptime` seconds from now
//!   exptime >= 30 days           absolute unix timestamp
//! ```
//!
//! The relative form is converted to an absolute timestamp at ingestion, so
//! everything stored in the cache is either [`Expiration::Never`] or
//! [`Expiration::At`].
//!
//! ## Lazy Expiry
//!
//! There is no background sweeper. The cache keeps a [`Deadline`]: the
//! earliest expiration among stored entries. Every cache access compares the
//! clock against it, and only when it has passed does the cache scan for
//! expired entries.

/// Exptimes below this many seconds (30 days) are offsets from now.
pub const RELATIVE_EXPTIME_LIMIT: i64 = 60 * 60 * 24 * 30;

/// Timestamp used for "already expired". Any real clock is past it.
const ALREADY_EXPIRED: i64 = 1;

/// When an entry expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    #[default]
    Never,
    /// Absolute unix timestamp in seconds.
    At(i64),
}

impl Expiration {
    /// Converts a client-supplied `exptime` into an absolute expiration.
    ///
    /// # Example
    ///
    /// ```
    /// use flashcached::storage::Expiration;
    ///
    /// assert_eq!(Expiration::from_exptime(0, 1_000), Expiration::Never);
    /// assert_eq!(Expiration::from_exptime(60, 1_000), Expiration::At(1_060));
    /// assert!(Expiration::from_exptime(-1, 1_000).is_expired(1_000));
    /// ```
    pub fn from_exptime(exptime: i64, now: i64) -> Self {
        match exptime {
            0 => Expiration::Never,
            e if e < 0 => Expiration::At(ALREADY_EXPIRED),
            e if e < RELATIVE_EXPTIME_LIMIT => Expiration::At(now.saturating_add(e)),
            e => Expiration::At(e),
        }
    }

    /// Returns true once `now` has reached the expiration timestamp.
    #[inline]
    pub fn is_expired(&self, now: i64) -> bool {
        match self {
            Expiration::Never => false,
            Expiration::At(at) => *at <= now,
        }
    }
}

/// The earliest known expiration among stored entries.
///
/// A deadline may be stale-early (the entry that set it was deleted or given a
/// later exptime). That only costs one sweep that finds nothing and then
/// recomputes the deadline; it is never stale-late.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<i64>,
}

impl Deadline {
    pub fn new() -> Self {
        Self { at: None }
    }

    /// Lowers the deadline if `expiration` comes sooner.
    pub fn consider(&mut self, expiration: Expiration) {
        if let Expiration::At(at) = expiration {
            self.at = Some(self.at.map_or(at, |current| current.min(at)));
        }
    }

    /// True when a sweep should run at `now`.
    #[inline]
    pub fn is_due(&self, now: i64) -> bool {
        self.at.is_some_and(|at| at <= now)
    }
}

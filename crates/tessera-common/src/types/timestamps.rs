//! Timestamp types for Tessera.
//!
//! Tables and rows report when they were created and last updated. Either
//! instant may be unknown, so row and table timestamps are carried as a
//! pair of optional [`Timestamp`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A wall-clock instant (microseconds since epoch).
///
/// # Example
///
/// ```rust
/// use tessera_common::types::Timestamp;
///
/// let ts = Timestamp::now();
/// assert!(ts.as_micros() > 0);
/// assert!(Timestamp::from_micros(10) > Timestamp::from_micros(5));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Zero timestamp (epoch).
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from microseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Creates a timestamp from the current system time.
    #[must_use]
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
    }

    /// Returns the timestamp as microseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Returns the timestamp as milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    /// Adds a duration to this timestamp.
    #[inline]
    #[must_use]
    pub fn add(self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}us)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format as ISO 8601 if reasonable
        if self.0 > 0 && self.0 < i64::MAX as u64 {
            let secs = (self.0 / 1_000_000) as i64;
            let subsec_micros = (self.0 % 1_000_000) as u32;
            if let Some(dt) = chrono::DateTime::from_timestamp(secs, subsec_micros * 1000) {
                return write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6fZ"));
            }
        }
        write!(f, "{}us", self.0)
    }
}

impl From<u64> for Timestamp {
    #[inline]
    fn from(micros: u64) -> Self {
        Self::from_micros(micros)
    }
}

impl From<Timestamp> for u64 {
    #[inline]
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// Creation and last-update instants of a table or a row.
///
/// Either instant may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamps {
    /// When the table or row was created.
    pub created: Option<Timestamp>,
    /// When the table or row was last updated.
    pub last_update: Option<Timestamp>,
}

impl Timestamps {
    /// Timestamps with both instants unknown.
    pub const UNKNOWN: Self = Self {
        created: None,
        last_update: None,
    };

    /// Creates timestamps from both instants.
    #[must_use]
    pub const fn new(created: Option<Timestamp>, last_update: Option<Timestamp>) -> Self {
        Self {
            created,
            last_update,
        }
    }

    /// Creates timestamps where creation and last update coincide.
    #[must_use]
    pub const fn at(instant: Timestamp) -> Self {
        Self::new(Some(instant), Some(instant))
    }

    /// Combines two timestamp pairs: earliest known creation, latest known
    /// update. Unknown instants contribute nothing.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            created: min_known(self.created, other.created),
            last_update: self.last_update.max(other.last_update),
        }
    }

    /// Folds [`Timestamps::union`] over an iterator.
    pub fn union_all<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        iter.into_iter().fold(Self::UNKNOWN, Self::union)
    }
}

fn min_known(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

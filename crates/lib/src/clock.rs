//! Time provider abstraction
//!
//! Delegations issued by the identity provider expire at an absolute time
//! expressed in nanoseconds since the Unix epoch. The [`Clock`] trait lets
//! production code read the system time while tests pin it.
//!
//! # Example
//!
//! ```
//! use liftcash_session::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! let nanos = clock.now_nanos();
//! assert!(nanos > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;

/// A time provider for delegation expiry checks.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as nanoseconds since Unix epoch.
    fn now_nanos(&self) -> u64;

    /// Returns the current time as an RFC3339-formatted string.
    fn now_rfc3339(&self) -> String {
        rfc3339_from_nanos(self.now_nanos())
    }
}

/// Formats a nanosecond timestamp as RFC3339, falling back to the epoch.
pub fn rfc3339_from_nanos(nanos: u64) -> String {
    use chrono::{TimeZone, Utc};
    let secs = (nanos / 1_000_000_000) as i64;
    let subsec = (nanos % 1_000_000_000) as u32;
    Utc.timestamp_opt(secs, subsec)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "1970-01-01T00:00:00+00:00".to_string())
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Test clock that only moves when told to.
///
/// Available in unit tests and with the `testing` feature.
///
/// ```ignore
/// use liftcash_session::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_000);
/// assert_eq!(clock.now_nanos(), 1_000);
/// clock.advance(500);
/// assert_eq!(clock.now_nanos(), 1_500);
/// ```
#[cfg(any(test, feature = "testing"))]
pub struct FixedClock {
    nanos: Mutex<u64>,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// Create a clock frozen at the given time in nanoseconds.
    pub fn new(nanos: u64) -> Self {
        Self {
            nanos: Mutex::new(nanos),
        }
    }

    /// Advance the clock by the given number of nanoseconds.
    pub fn advance(&self, nanos: u64) {
        *self.nanos.lock().unwrap() += nanos;
    }

    /// Set the clock to a specific time in nanoseconds.
    pub fn set(&self, nanos: u64) {
        *self.nanos.lock().unwrap() = nanos;
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_nanos(&self) -> u64 {
        *self.nanos.lock().unwrap()
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1_704_067_200_000_000_000)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Debug for FixedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedClock")
            .field("nanos", &*self.nanos.lock().unwrap())
            .finish()
    }
}

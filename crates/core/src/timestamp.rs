//! Protocol timestamp type
//!
//! Timestamps cross the engine boundary as seconds since Unix epoch plus a
//! nanosecond remainder within that second. Storage is nanosecond-wide, but
//! [`Timestamp::now`] reads the clock at millisecond precision, which is what
//! typical sources populate.
//!
//! ## Usage
//!
//! ```
//! use tessera_core::Timestamp;
//!
//! let ts = Timestamp::new(1_700_000_000, 250_000_000).unwrap();
//! let dt = ts.to_datetime().unwrap();
//! assert_eq!(Timestamp::from_datetime(dt), ts);
//! ```

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u32 = 1_000_000_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// Point in time as `{seconds, nanos}` since Unix epoch
///
/// ## Invariants
///
/// - `nanos` is always in `0..1_000_000_000`
/// - Ordering is chronological (seconds first, then nanos)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireTimestamp")]
pub struct Timestamp {
    seconds: i64,
    nanos: u32,
}

/// Unchecked wire form
#[derive(Deserialize)]
struct WireTimestamp {
    seconds: i64,
    nanos: u32,
}

impl TryFrom<WireTimestamp> for Timestamp {
    type Error = Error;

    fn try_from(wire: WireTimestamp) -> Result<Self> {
        Timestamp::new(wire.seconds, wire.nanos)
    }
}

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp {
        seconds: 0,
        nanos: 0,
    };

    /// Create a timestamp from its wire form
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if `nanos` is not a remainder within one second.
    pub fn new(seconds: i64, nanos: u32) -> Result<Self> {
        if nanos >= NANOS_PER_SEC {
            return Err(Error::DecodeError(format!(
                "timestamp nanos out of range: {}",
                nanos
            )));
        }
        Ok(Timestamp { seconds, nanos })
    }

    /// Current time, truncated to millisecond precision
    pub fn now() -> Self {
        let now = Utc::now();
        let nanos = now.timestamp_subsec_nanos() % NANOS_PER_SEC;
        Timestamp {
            seconds: now.timestamp(),
            nanos: nanos - nanos % NANOS_PER_MILLI,
        }
    }

    /// Create a timestamp from milliseconds since epoch
    pub fn from_millis(millis: i64) -> Self {
        Timestamp {
            seconds: millis.div_euclid(1_000),
            nanos: (millis.rem_euclid(1_000) as u32) * NANOS_PER_MILLI,
        }
    }

    /// Convert from a chrono date-time without losing sub-second precision
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        // chrono encodes leap seconds as nanos >= 1e9; fold them into the next second
        let subsec = dt.timestamp_subsec_nanos();
        Timestamp {
            seconds: dt.timestamp() + i64::from(subsec / NANOS_PER_SEC),
            nanos: subsec % NANOS_PER_SEC,
        }
    }

    /// Convert to a chrono date-time
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the seconds are outside chrono's representable range.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.seconds, self.nanos).ok_or_else(|| {
            Error::DecodeError(format!("timestamp out of range: {}", self.seconds))
        })
    }

    /// Seconds since Unix epoch
    #[inline]
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Nanosecond remainder within the second
    #[inline]
    pub const fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Milliseconds since Unix epoch (truncates)
    pub fn as_millis(&self) -> i64 {
        self.seconds * 1_000 + i64::from(self.nanos / NANOS_PER_MILLI)
    }

    /// Nanoseconds since Unix epoch
    pub fn as_nanos(&self) -> i128 {
        i128::from(self.seconds) * i128::from(NANOS_PER_SEC) + i128::from(self.nanos)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::EPOCH
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::from_datetime(dt)
    }
}

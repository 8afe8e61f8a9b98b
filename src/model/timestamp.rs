//! Change-tracking timestamps

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Last value handed out by [`Timestamp::now`]
static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

/// Nanoseconds since the Unix epoch
///
/// `Timestamp::now()` is strictly increasing within a process, so a
/// modification stamped after a check always compares greater than it, even
/// on platforms with a coarse wall clock.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The "never" sentinel; earlier than every issued timestamp
    pub const NEVER: Timestamp = Timestamp(0);

    /// Current time, strictly greater than every previously issued value
    pub fn now() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let mut last = LAST_ISSUED.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last + 1);
            match LAST_ISSUED.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Timestamp(next),
                Err(observed) => last = observed,
            }
        }
    }

    /// Raise the floor for [`Timestamp::now`] to at least `seen`
    ///
    /// Called with persisted stamps so a wall clock stepped back since they
    /// were written cannot issue a stamp ordered before them.
    pub fn observe(seen: Timestamp) {
        LAST_ISSUED.fetch_max(seen.0, Ordering::AcqRel);
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn is_never(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "Timestamp(never)")
        } else {
            write!(f, "Timestamp({})", self.0)
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Wall-clock sources for the time query import

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub trait WallClock {
    fn now_millis(&self) -> u64;
}

/// The host system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct FixedClock {
    millis: Cell<u64>,
}

impl FixedClock {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Cell::new(millis),
        }
    }

    pub fn set(&self, millis: u64) {
        self.millis.set(millis);
    }

    pub fn advance(&self, millis: u64) {
        self.millis.set(self.millis.get() + millis);
    }
}

impl WallClock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.millis.get()
    }
}

/// Split epoch milliseconds into the `(tv_sec, tv_nsec)` words of a timespec
///
/// Both words are truncated to 32 bits the way the module's ABI stores them.
pub fn timespec_words(millis: u64) -> (i32, i32) {
    let seconds = (millis / 1000) as i32;
    let nanos = ((millis % 1000) * 1_000_000) as i32;
    (seconds, nanos)
}

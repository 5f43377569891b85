//! Time source for operation timestamps.
//!
//! Records carry the author's wall-clock issue time for display and
//! auditing only; ordering never depends on it. Tests substitute a
//! [`FixedClock`] so recorded timestamps are reproducible.
//!
//! ```
//! use sharedoc::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! assert!(clock.now_millis() > 0);
//! assert!(clock.now_rfc3339().ends_with('Z'));
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, TimeZone, Utc};

/// A provider of the current time.
pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// The current time as an RFC3339 UTC string with millisecond precision.
    fn now_rfc3339(&self) -> String {
        format_millis(self.now_millis())
    }
}

/// Formats milliseconds since the epoch as RFC3339.
pub fn format_millis(millis: u64) -> String {
    let secs = (millis / 1000) as i64;
    let nanos = ((millis % 1000) * 1_000_000) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }

    fn now_rfc3339(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Deterministic clock that advances by a fixed step on every read.
///
/// Used by tests and by replay tooling that needs reproducible timestamps.
///
/// ```
/// use sharedoc::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_000).with_step(10);
/// assert_eq!(clock.now_millis(), 1_000);
/// assert_eq!(clock.now_millis(), 1_010);
/// clock.set(0);
/// assert_eq!(clock.now_rfc3339(), "1970-01-01T00:00:00.000Z");
/// ```
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicU64,
    step: u64,
}

impl FixedClock {
    /// Starts at `millis` and advances by one millisecond per read.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
            step: 1,
        }
    }

    /// Sets the per-read step. A step of zero freezes the clock.
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    pub fn advance(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.millis.store(ms, Ordering::SeqCst);
    }

    /// Current value, without advancing.
    pub fn get(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.millis.fetch_add(self.step, Ordering::SeqCst)
    }
}

impl Default for FixedClock {
    /// 2024-01-01T00:00:00Z, frozen.
    fn default() -> Self {
        Self::new(1_704_067_200_000).with_step(0)
    }
}

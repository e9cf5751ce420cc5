//! Injectable clock.
//!
//! The reconciliation policy compares wall-clock time against the last
//! successful sync. Hiding time behind [`Clock`] lets tests fast-forward the
//! interval instead of sleeping through it.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// Hand-driven clock for deterministic tests.
///
/// # Example
///
/// ```
/// use cookbook_sync::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(30 * 60 * 1000);
/// assert_eq!(clock.now_ms(), 1_000 + 30 * 60 * 1000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given time.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::AcqRel);
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

//! Shared primitive IDs, calendar helpers, and the clock seam.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

/// Locally assigned sync-queue entry identifier.
pub type QueueId = u64;
/// Remote player identifier.
pub type UserId = String;
/// Calendar day with no time component, always interpreted in UTC.
pub type CalendarDay = NaiveDate;
/// Wall-clock instant in UTC.
pub type Timestamp = DateTime<Utc>;

/// Returns the UTC calendar day containing `ts`.
pub fn utc_day(ts: Timestamp) -> CalendarDay {
    ts.date_naive()
}

/// Source of "now" for the controller and sync layers.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;

    /// Current UTC calendar day.
    fn today(&self) -> CalendarDay {
        utc_day(self.now())
    }
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock for replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a clock pinned at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock to `ts`.
    pub fn set(&self, ts: Timestamp) {
        if let Ok(mut now) = self.now.lock() {
            *now = ts;
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

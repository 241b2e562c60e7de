//! Fixed-window attempt limiter keyed by caller identity.

use std::time::Duration;

use chrono::Utc;
use hashbrown::HashMap;
use tracing::debug;

use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowState {
    index: i64,
    count: u32,
}

/// Allows at most `limit` checks per key in each `window`.
#[derive(Debug)]
pub struct RateLimiter {
    window_ms: i64,
    limit: u32,
    windows: HashMap<String, WindowState>,
}

impl RateLimiter {
    /// A zero `window` is treated as one millisecond.
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX).max(1),
            limit,
            windows: HashMap::new(),
        }
    }

    /// Records an attempt for `key` now and reports whether it is allowed.
    pub fn check(&mut self, key: &str) -> bool {
        self.check_at(key, Utc::now())
    }

    /// Records an attempt for `key` at `now` and reports whether it is allowed.
    pub fn check_at(&mut self, key: &str, now: Timestamp) -> bool {
        let index = now.timestamp_millis().div_euclid(self.window_ms);
        if let Some(state) = self.windows.get_mut(key) {
            if state.index == index {
                if state.count >= self.limit {
                    debug!("[RATE] Limit reached for {}", key);
                    return false;
                }
                state.count += 1;
                return true;
            }
        }

        if self.limit == 0 {
            return false;
        }
        self.windows
            .insert(key.to_string(), WindowState { index, count: 1 });
        true
    }

    /// Drops keys whose window has passed.
    pub fn prune(&mut self, now: Timestamp) {
        let index = now.timestamp_millis().div_euclid(self.window_ms);
        self.windows.retain(|_, state| state.index == index);
    }

    /// Keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

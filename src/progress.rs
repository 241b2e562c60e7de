//! Daily progress, streak aggregate, and sync-queue records.

use serde::{Deserialize, Serialize};

use crate::types::{CalendarDay, QueueId, Timestamp, UserId, utc_day};

/// One solved day for the local player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Calendar day, the record key.
    pub date: CalendarDay,
    /// `p-<date>` of the solved puzzle.
    pub puzzle_id: String,
    /// True once solved.
    pub solved: bool,
    /// Points awarded.
    pub score: u32,
    /// Seconds from session start to solve.
    pub duration_sec: u64,
    /// True when a hint was used before solving.
    pub hint_used: bool,
    /// Solve instant.
    pub completed_at: Timestamp,
}

/// Singleton streak aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    /// Consecutive solved days.
    pub streak: u32,
    /// Instant of the last solve, if any.
    pub last_played: Option<Timestamp>,
    /// Running point total.
    pub total_points: u64,
}

impl StreakState {
    /// State after a solve at `now` worth `score` points.
    pub fn after_solve(&self, now: Timestamp, score: u32) -> Self {
        Self {
            streak: next_streak(self.last_played, now, self.streak),
            last_played: Some(now),
            total_points: self.total_points.saturating_add(u64::from(score)),
        }
    }
}

/// Streak value after solving at `now`.
///
/// Same UTC day keeps the streak (at least 1), the next day extends it, and
/// any other gap starts over at 1.
pub fn next_streak(last_played: Option<Timestamp>, now: Timestamp, current: u32) -> u32 {
    let Some(last) = last_played else {
        return 1;
    };
    match (utc_day(now) - utc_day(last)).num_days() {
        0 => current.max(1),
        1 => current.saturating_add(1),
        _ => 1,
    }
}

/// Outbound score payload, as sent to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Remote player id.
    pub user_id: UserId,
    /// Solved puzzle id.
    pub puzzle_id: String,
    /// Points awarded.
    pub score: u32,
    /// Seconds taken.
    pub time_taken: u64,
    /// Solve instant; the remote truncates it to a UTC day.
    pub solved_at: Timestamp,
}

/// A [`SyncRecord`] waiting in the local outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncQueueEntry {
    /// Local queue id, used only for removal.
    pub id: QueueId,
    /// Queued payload.
    pub record: SyncRecord,
}

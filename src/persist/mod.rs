//! Local persistence: the store trait, its errors, and the shared handle.

/// SQLite-backed [`LocalStore`].
pub mod sqlite;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    progress::{ProgressRecord, StreakState, SyncQueueEntry, SyncRecord},
    types::{CalendarDay, QueueId},
};

/// Settings key holding the lifetime solved-day counter.
pub const SOLVED_COUNT_KEY: &str = "solvedCount";

/// Local read or write failure. The dependent operation must not report success.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite call failed.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Payload could not be encoded or decoded.
    #[error("payload encoding: {0}")]
    Serde(#[from] serde_json::Error),
    /// Payload written by a newer format.
    #[error("unsupported payload format version {0}")]
    UnsupportedFormat(u16),
    /// Backing storage cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The blocking task running the store call died.
    #[error("blocking task failed: {0}")]
    Join(String),
    /// A stored setting does not have the expected shape.
    #[error("setting `{key}` holds malformed value {value}")]
    MalformedSetting {
        /// Setting name.
        key: &'static str,
        /// Stored value, rendered as JSON.
        value: String,
    },
}

/// Result alias for store calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Store handle shared by the controller and the sync worker.
pub type SharedStore = Arc<Mutex<Box<dyn LocalStore>>>;

/// Wraps a store for sharing across tasks.
pub fn shared(store: Box<dyn LocalStore>) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Runs `f` against the store on the blocking pool.
pub async fn with_store<T, F>(store: &SharedStore, f: F) -> PersistResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn LocalStore) -> PersistResult<T> + Send + 'static,
{
    let store_ref = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
        let mut store = store_ref.blocking_lock();
        f(&mut **store)
    })
    .await
    .map_err(|e| PersistError::Join(e.to_string()))?
}

/// Every write a confirmed solve needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveCommit {
    /// Solved day record.
    pub progress: ProgressRecord,
    /// Streak after the solve.
    pub streak: StreakState,
    /// Lifetime solved-day counter after the solve.
    pub solved_count: u64,
    /// Queued copy for the remote.
    pub sync: SyncRecord,
}

/// Durable local persistence for the current player.
///
/// Four independent collections: progress keyed by date, the streak singleton,
/// settings keyed by name, and the outbound sync queue.
pub trait LocalStore: Send {
    /// Upserts by `record.date`; last write wins.
    fn put_progress(&mut self, record: &ProgressRecord) -> PersistResult<()>;
    /// Progress for `date`, if any.
    fn get_progress(&self, date: CalendarDay) -> PersistResult<Option<ProgressRecord>>;
    /// All progress records, ordered by date.
    fn all_progress(&self) -> PersistResult<Vec<ProgressRecord>>;

    /// Replaces the streak singleton.
    fn put_streak(&mut self, state: &StreakState) -> PersistResult<()>;
    /// Streak singleton, if ever written.
    fn get_streak(&self) -> PersistResult<Option<StreakState>>;

    /// Upserts a setting by name.
    fn put_setting(&mut self, key: &str, value: &serde_json::Value) -> PersistResult<()>;
    /// Setting value, or `default` when unset.
    fn get_setting(&self, key: &str, default: serde_json::Value) -> PersistResult<serde_json::Value>;

    /// Appends to the sync queue and returns the assigned id.
    fn enqueue_sync(&mut self, record: &SyncRecord) -> PersistResult<QueueId>;
    /// Up to `limit` entries, oldest first.
    fn peek_queue(&self, limit: usize) -> PersistResult<Vec<SyncQueueEntry>>;
    /// Deletes exactly `ids`; unknown ids are ignored. Returns rows removed.
    fn remove_from_queue(&mut self, ids: &[QueueId]) -> PersistResult<usize>;

    /// Persists a solve. Progress is written and enqueued before the counters,
    /// so a failure part-way never leaves a progress row without its queue entry.
    fn commit_solve(&mut self, commit: &SolveCommit) -> PersistResult<QueueId> {
        self.put_progress(&commit.progress)?;
        let id = self.enqueue_sync(&commit.sync)?;
        self.put_streak(&commit.streak)?;
        self.put_setting(SOLVED_COUNT_KEY, &serde_json::Value::from(commit.solved_count))?;
        Ok(id)
    }

    /// Current lifetime solved-day counter. A non-counter value is an error.
    fn solved_count(&self) -> PersistResult<u64> {
        let value = self.get_setting(SOLVED_COUNT_KEY, serde_json::Value::from(0u64))?;
        value.as_u64().ok_or_else(|| PersistError::MalformedSetting {
            key: SOLVED_COUNT_KEY,
            value: value.to_string(),
        })
    }
}

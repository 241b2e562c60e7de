//! SQLite-backed daily score ledger with (user, UTC day) upserts.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    engine::validator::InputError,
    progress::SyncRecord,
    sync::{BatchReceipt, RemoteError, RemoteStore},
    types::{CalendarDay, Clock, Timestamp, utc_day},
};

/// Default number of leaderboard rows.
pub const LEADERBOARD_LIMIT: usize = 100;
/// Days of history considered for per-user stats.
pub const STATS_WINDOW: usize = 30;
/// Recent scores returned with per-user stats.
pub const STATS_RECENT: usize = 10;

/// Ledger failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The submission failed validation.
    #[error("invalid submission: {0}")]
    Input(#[from] InputError),
    /// SQLite call failed.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result alias for ledger calls.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Score payload as received over the wire. Every field is checked independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    /// Submitting user; required and non-empty.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Puzzle id; required and non-empty.
    #[serde(default)]
    pub puzzle_id: Option<String>,
    /// Must be an integer.
    #[serde(default)]
    pub score: serde_json::Value,
    /// Seconds; must be an integer.
    #[serde(default)]
    pub time_taken: serde_json::Value,
    /// RFC 3339 instant. Absent means now.
    #[serde(default)]
    pub solved_at: Option<String>,
}

impl From<&SyncRecord> for ScoreSubmission {
    fn from(record: &SyncRecord) -> Self {
        Self {
            user_id: Some(record.user_id.clone()),
            puzzle_id: Some(record.puzzle_id.clone()),
            score: serde_json::Value::from(record.score),
            time_taken: serde_json::Value::from(record.time_taken),
            solved_at: Some(record.solved_at.to_rfc3339()),
        }
    }
}

/// A submission that passed validation, with its day already truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidScore {
    /// Submitting user.
    pub user_id: String,
    /// Puzzle id.
    pub puzzle_id: String,
    /// Points.
    pub score: i64,
    /// Seconds.
    pub time_taken: i64,
    /// UTC day of `solvedAt`.
    pub day: CalendarDay,
}

impl ScoreSubmission {
    /// Checks required fields and truncates `solvedAt` (or `now` when absent)
    /// to its UTC calendar day.
    pub fn validate(&self, now: Timestamp) -> Result<ValidScore, InputError> {
        let user_id = non_empty(&self.user_id).ok_or(InputError::MissingField("userId"))?;
        let puzzle_id = non_empty(&self.puzzle_id).ok_or(InputError::MissingField("puzzleId"))?;
        let score = self.score.as_i64().ok_or(InputError::NonNumeric("score"))?;
        let time_taken = self
            .time_taken
            .as_i64()
            .ok_or(InputError::NonNumeric("timeTaken"))?;
        let solved_at = match self.solved_at.as_deref() {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_err(|_| InputError::InvalidTimestamp("solvedAt"))?
                .to_utc(),
            None => now,
        };

        Ok(ValidScore {
            user_id: user_id.to_string(),
            puzzle_id: puzzle_id.to_string(),
            score,
            time_taken,
            day: utc_day(solved_at),
        })
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// Stored row for one (user, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyScore {
    /// Row id, stable across overwrites.
    pub id: i64,
    /// Owner.
    pub user_id: String,
    /// UTC day the score counts for.
    pub date: CalendarDay,
    /// Puzzle of the latest submission.
    pub puzzle_id: String,
    /// Latest score.
    pub score: i64,
    /// Latest time in seconds.
    pub time_taken: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// One ranked row of a day's leaderboard.
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// Ranked user.
    pub user_id: String,
    /// Email, or `"Anonymous"`.
    pub display_name: String,
    /// Score for the day.
    pub score: i64,
    /// Tiebreak; lower ranks higher.
    pub time_taken: i64,
    /// Current streak of the user.
    pub streak: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Profile and recent history of one user.
pub struct UserStats {
    /// User.
    pub user_id: String,
    /// Email, if known.
    pub email: Option<String>,
    /// Streak as last reported.
    pub streak_count: i64,
    /// Last reported play instant.
    pub last_played: Option<Timestamp>,
    /// Lifetime points as last reported.
    pub total_points: i64,
    /// Days played within the stats window.
    pub puzzles_solved: usize,
    /// Rounded mean of `time_taken` over days played; 0 with no history.
    pub avg_solve_time: i64,
    /// Newest first.
    pub recent_scores: Vec<DailyScore>,
}

/// Server-owned score store.
#[derive(Debug)]
pub struct ScoreLedger {
    conn: Connection,
}

impl ScoreLedger {
    /// Opens or creates a file-backed ledger.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Ledger that lives as long as the value.
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> LedgerResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Stores one submission. Invalid payloads are rejected outright.
    pub fn submit(&mut self, submission: &ScoreSubmission, now: Timestamp) -> LedgerResult<DailyScore> {
        let valid = submission.validate(now)?;
        let tx = self.conn.transaction()?;
        let row = upsert_score(&tx, &valid)?;
        tx.commit()?;
        Ok(row)
    }

    /// Stores a batch in one transaction. Invalid records are skipped, not fatal.
    /// Returns how many records were stored.
    pub fn submit_batch(&mut self, submissions: &[ScoreSubmission], now: Timestamp) -> LedgerResult<usize> {
        if submissions.is_empty() {
            return Err(InputError::MissingField("records").into());
        }

        let tx = self.conn.transaction()?;
        let mut processed = 0;
        for submission in submissions {
            match submission.validate(now) {
                Ok(valid) => {
                    upsert_score(&tx, &valid)?;
                    processed += 1;
                }
                Err(err) => debug!("[LEDGER] Dropping record from batch: {}", err),
            }
        }
        tx.commit()?;
        info!("[LEDGER] Batch stored {}/{} records", processed, submissions.len());
        Ok(processed)
    }

    /// Top `limit` scores for `day`, best score first, then fastest.
    pub fn leaderboard(&self, day: CalendarDay, limit: usize) -> LedgerResult<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.user_id, u.email, s.score, s.time_taken, u.streak_count
             FROM daily_scores s JOIN users u ON u.id = s.user_id
             WHERE s.day = ?1
             ORDER BY s.score DESC, s.time_taken ASC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![day.to_string(), limit], |row| {
            let email: Option<String> = row.get(1)?;
            Ok(LeaderboardEntry {
                rank: 0,
                user_id: row.get(0)?,
                display_name: email.unwrap_or_else(|| "Anonymous".to_string()),
                score: row.get(2)?,
                time_taken: row.get(3)?,
                streak: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for (idx, row) in rows.enumerate() {
            let mut entry = row?;
            entry.rank = idx + 1;
            out.push(entry);
        }
        Ok(out)
    }

    /// Aggregates for `user_id`, or `None` if the user never submitted.
    pub fn user_stats(&self, user_id: &str) -> LedgerResult<Option<UserStats>> {
        let user = self
            .conn
            .query_row(
                "SELECT email, streak_count, last_played, total_points FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((email, streak_count, last_played, total_points)) = user else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, day, puzzle_id, score, time_taken
             FROM daily_scores WHERE user_id = ?1
             ORDER BY day DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, STATS_WINDOW as i64], daily_score_from_row)?;
        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }

        let puzzles_solved = history.len();
        let avg_solve_time = if puzzles_solved > 0 {
            let total: i64 = history.iter().map(|s| s.time_taken).sum();
            (total as f64 / puzzles_solved as f64).round() as i64
        } else {
            0
        };
        history.truncate(STATS_RECENT);

        Ok(Some(UserStats {
            user_id: user_id.to_string(),
            email,
            streak_count,
            last_played: last_played
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|ts| ts.to_utc()),
            total_points,
            puzzles_solved,
            avg_solve_time,
            recent_scores: history,
        }))
    }

    /// Records the client's streak aggregate. Returns false for unknown users.
    pub fn update_streak(
        &mut self,
        user_id: &str,
        streak: i64,
        last_played: Option<Timestamp>,
        total_points: Option<i64>,
    ) -> LedgerResult<bool> {
        let changed = self.conn.execute(
            "UPDATE users SET streak_count = ?2,
                 last_played = COALESCE(?3, last_played),
                 total_points = COALESCE(?4, total_points)
             WHERE id = ?1",
            params![
                user_id,
                streak,
                last_played.map(|ts| ts.to_rfc3339()),
                total_points
            ],
        )?;
        Ok(changed > 0)
    }
}

fn ensure_user(conn: &Connection, user_id: &str) -> rusqlite::Result<()> {
    let email = user_id.contains('@').then_some(user_id);
    conn.execute(
        "INSERT INTO users(id, email) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
        params![user_id, email],
    )?;
    Ok(())
}

fn upsert_score(conn: &Connection, valid: &ValidScore) -> rusqlite::Result<DailyScore> {
    ensure_user(conn, &valid.user_id)?;
    conn.query_row(
        "INSERT INTO daily_scores(user_id, day, puzzle_id, score, time_taken)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, day) DO UPDATE SET
             puzzle_id = excluded.puzzle_id,
             score = excluded.score,
             time_taken = excluded.time_taken
         RETURNING id, user_id, day, puzzle_id, score, time_taken",
        params![
            valid.user_id,
            valid.day.to_string(),
            valid.puzzle_id,
            valid.score,
            valid.time_taken
        ],
        daily_score_from_row,
    )
}

fn daily_score_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyScore> {
    let day: String = row.get(2)?;
    let date = day.parse::<CalendarDay>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(DailyScore {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date,
        puzzle_id: row.get(3)?,
        score: row.get(4)?,
        time_taken: row.get(5)?,
    })
}

/// In-process [`RemoteStore`] backed by a [`ScoreLedger`].
pub struct LedgerRemote {
    ledger: Mutex<ScoreLedger>,
    clock: Arc<dyn Clock>,
}

impl LedgerRemote {
    /// Wraps `ledger`; `clock` stands in for a missing `solvedAt`.
    pub fn new(ledger: ScoreLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            clock,
        }
    }

    fn store_batch(&self, batch: &[SyncRecord]) -> Result<BatchReceipt, RemoteError> {
        let submissions: Vec<ScoreSubmission> = batch.iter().map(ScoreSubmission::from).collect();
        let now = self.clock.now();
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| RemoteError::Transport("ledger lock poisoned".to_string()))?;
        let processed = ledger
            .submit_batch(&submissions, now)
            .map_err(|err| RemoteError::Rejected(err.to_string()))?;
        Ok(BatchReceipt { processed })
    }

    /// Runs a read against the underlying ledger.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&ScoreLedger) -> T) -> Option<T> {
        self.ledger.lock().ok().map(|ledger| f(&ledger))
    }
}

#[async_trait]
impl RemoteStore for LedgerRemote {
    async fn upsert_scores(&self, batch: &[SyncRecord]) -> Result<BatchReceipt, RemoteError> {
        self.store_batch(batch)
    }
}

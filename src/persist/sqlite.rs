//! SQLite-backed local store.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    progress::{ProgressRecord, StreakState, SyncQueueEntry, SyncRecord},
    types::{CalendarDay, QueueId},
};

use super::{LocalStore, PersistError, PersistResult, SOLVED_COUNT_KEY, SolveCommit};

/// Version number for serialized row payloads.
pub const PAYLOAD_FORMAT_VERSION: u16 = 1;

const STREAK_ROW_ID: i64 = 1;

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u16,
    body: T,
}

/// SQLite implementation of [`crate::persist::LocalStore`].
#[derive(Debug)]
pub struct SqliteLocalStore {
    conn: Connection,
}

impl SqliteLocalStore {
    /// Opens or creates a store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Number of entries waiting in the sync queue.
    pub fn queue_len(&self) -> PersistResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl LocalStore for SqliteLocalStore {
    fn put_progress(&mut self, record: &ProgressRecord) -> PersistResult<()> {
        write_progress(&self.conn, record)
    }

    fn get_progress(&self, date: CalendarDay) -> PersistResult<Option<ProgressRecord>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM daily_progress WHERE date = ?1",
                params![date.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(|p| decode_payload(&p)).transpose()
    }

    fn all_progress(&self) -> PersistResult<Vec<ProgressRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM daily_progress ORDER BY date ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode_payload(&row?)?);
        }
        Ok(out)
    }

    fn put_streak(&mut self, state: &StreakState) -> PersistResult<()> {
        write_streak(&self.conn, state)
    }

    fn get_streak(&self) -> PersistResult<Option<StreakState>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM streak_state WHERE id = ?1",
                params![STREAK_ROW_ID],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(|p| decode_payload(&p)).transpose()
    }

    fn put_setting(&mut self, key: &str, value: &serde_json::Value) -> PersistResult<()> {
        write_setting(&self.conn, key, value)
    }

    fn get_setting(&self, key: &str, default: serde_json::Value) -> PersistResult<serde_json::Value> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => match serde_json::from_str(&raw)? {
                serde_json::Value::Null => Ok(default),
                value => Ok(value),
            },
            None => Ok(default),
        }
    }

    fn enqueue_sync(&mut self, record: &SyncRecord) -> PersistResult<QueueId> {
        write_queue_entry(&self.conn, record)
    }

    fn peek_queue(&self, limit: usize) -> PersistResult<Vec<SyncQueueEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, payload FROM sync_queue ORDER BY id ASC LIMIT ?1")?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            let id: i64 = row.get(0)?;
            let payload: Vec<u8> = row.get(1)?;
            Ok((id, payload))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            out.push(SyncQueueEntry {
                id: id as QueueId,
                record: decode_payload(&payload)?,
            });
        }
        Ok(out)
    }

    fn remove_from_queue(&mut self, ids: &[QueueId]) -> PersistResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM sync_queue WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute(params![*id as i64])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn commit_solve(&mut self, commit: &SolveCommit) -> PersistResult<QueueId> {
        let tx = self.conn.transaction()?;
        write_progress(&tx, &commit.progress)?;
        let id = write_queue_entry(&tx, &commit.sync)?;
        write_streak(&tx, &commit.streak)?;
        write_setting(
            &tx,
            SOLVED_COUNT_KEY,
            &serde_json::Value::from(commit.solved_count),
        )?;
        tx.commit()?;
        Ok(id)
    }
}

fn write_progress(conn: &Connection, record: &ProgressRecord) -> PersistResult<()> {
    let payload = encode_payload(record)?;
    conn.execute(
        "INSERT INTO daily_progress(date, ts_ms, payload) VALUES (?1, ?2, ?3)
         ON CONFLICT(date) DO UPDATE SET ts_ms = excluded.ts_ms, payload = excluded.payload",
        params![record.date.to_string(), now_ms() as i64, payload],
    )?;
    Ok(())
}

fn write_streak(conn: &Connection, state: &StreakState) -> PersistResult<()> {
    let payload = encode_payload(state)?;
    conn.execute(
        "INSERT INTO streak_state(id, ts_ms, payload) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET ts_ms = excluded.ts_ms, payload = excluded.payload",
        params![STREAK_ROW_ID, now_ms() as i64, payload],
    )?;
    Ok(())
}

fn write_setting(conn: &Connection, key: &str, value: &serde_json::Value) -> PersistResult<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings(key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, raw],
    )?;
    Ok(())
}

fn write_queue_entry(conn: &Connection, record: &SyncRecord) -> PersistResult<QueueId> {
    let payload = encode_payload(record)?;
    conn.execute(
        "INSERT INTO sync_queue(ts_ms, payload) VALUES (?1, ?2)",
        params![now_ms() as i64, payload],
    )?;
    Ok(conn.last_insert_rowid() as QueueId)
}

fn encode_payload<T: Serialize>(body: &T) -> PersistResult<Vec<u8>> {
    let env = Envelope {
        format_version: PAYLOAD_FORMAT_VERSION,
        body,
    };
    Ok(serde_json::to_vec(&env)?)
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> PersistResult<T> {
    let env: Envelope<T> = serde_json::from_slice(payload)?;
    if env.format_version != PAYLOAD_FORMAT_VERSION {
        return Err(PersistError::UnsupportedFormat(env.format_version));
    }
    Ok(env.body)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn unsupported_payload_version_is_rejected() {
        let raw = br#"{"format_version":9,"body":{"streak":1,"lastPlayed":null,"totalPoints":0}}"#;
        let err = decode_payload::<StreakState>(raw).expect_err("version");
        assert!(matches!(err, PersistError::UnsupportedFormat(9)));
    }

    #[test]
    fn payload_keeps_camel_case_fields() {
        let state = StreakState {
            streak: 2,
            last_played: Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).single(),
            total_points: 540,
        };
        let bytes = encode_payload(&state).expect("encode");
        let text = String::from_utf8(bytes.clone()).expect("utf8");
        assert!(text.contains("\"totalPoints\":540"));
        assert_eq!(decode_payload::<StreakState>(&bytes).expect("decode"), state);
    }
}

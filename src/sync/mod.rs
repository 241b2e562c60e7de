//! Outbound score sync: remote seam, queue draining, and flush scheduling.

/// Queue-draining agent.
pub mod agent;
/// Solve-count driven flush scheduling.
pub mod trigger;

use async_trait::async_trait;
use thiserror::Error;

use crate::{persist::PersistError, progress::SyncRecord};

/// Remote call failure. The whole batch is treated as not delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote answered with a non-success status.
    #[error("remote rejected batch: {0}")]
    Rejected(String),
    /// The request never completed.
    #[error("transport failure: {0}")]
    Transport(String),
    /// No answer within the configured deadline.
    #[error("remote call timed out")]
    Timeout,
}

/// Sync failure. Never fatal to the local session; the queue stays intact.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Local queue could not be read or trimmed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Remote acknowledgement for one upsert batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReceipt {
    /// Records the remote actually stored; invalid ones are skipped server-side.
    pub processed: usize,
}

/// Server-side idempotent upsert keyed by (user, UTC day).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Submits `batch` in one call. Success or failure applies to the whole call.
    async fn upsert_scores(&self, batch: &[SyncRecord]) -> Result<BatchReceipt, RemoteError>;
}

/// Result of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    /// Queue entries acknowledged and removed.
    pub synced: usize,
    /// Records the remote reported as stored.
    pub processed: usize,
}

/// Observable sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Nothing in flight; last flush (if any) succeeded.
    #[default]
    Idle,
    /// A flush is in flight.
    Syncing,
    /// The last flush failed; entries remain queued for the next trigger.
    Failed,
}

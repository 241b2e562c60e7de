use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    persist::{SharedStore, with_store},
    progress::SyncRecord,
    types::QueueId,
};

use super::{RemoteError, RemoteStore, SyncError, SyncOutcome};

/// Drains the local sync queue into a [`RemoteStore`].
///
/// A batch is removed from the queue only after the remote confirms the whole
/// call. Failures leave the queue exactly as it was.
#[derive(Clone)]
pub struct SyncAgent {
    store: SharedStore,
    remote: Arc<dyn RemoteStore>,
    remote_timeout: Option<Duration>,
}

impl SyncAgent {
    /// Agent without a remote timeout.
    pub fn new(store: SharedStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            remote,
            remote_timeout: None,
        }
    }

    /// Treats a remote call slower than `timeout` as a failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }

    /// Sends up to `max_batch` queued scores in one call and removes them only
    /// after the remote accepted them. An empty queue makes no call.
    pub async fn flush(&self, max_batch: usize) -> Result<SyncOutcome, SyncError> {
        let entries = with_store(&self.store, move |s| s.peek_queue(max_batch)).await?;
        if entries.is_empty() {
            debug!("[SYNC] Queue empty, nothing to flush");
            return Ok(SyncOutcome::default());
        }

        let ids: Vec<QueueId> = entries.iter().map(|e| e.id).collect();
        let batch: Vec<SyncRecord> = entries.into_iter().map(|e| e.record).collect();
        debug!("[SYNC] Flushing {} queued scores", batch.len());

        let receipt = match self.submit(&batch).await {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!("[SYNC] Flush of {} scores failed: {}", batch.len(), err);
                return Err(err.into());
            }
        };

        let removed = with_store(&self.store, move |s| s.remove_from_queue(&ids)).await?;
        info!(
            "[SYNC] Synced {} scores ({} stored remotely)",
            removed, receipt.processed
        );

        Ok(SyncOutcome {
            synced: batch.len(),
            processed: receipt.processed,
        })
    }

    async fn submit(&self, batch: &[SyncRecord]) -> Result<super::BatchReceipt, RemoteError> {
        let call = self.remote.upsert_scores(batch);
        match self.remote_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RemoteError::Timeout)?,
            None => call.await,
        }
    }
}

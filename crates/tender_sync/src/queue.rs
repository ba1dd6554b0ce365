//! Durable change queue
//!
//! Every local edit made while unconfirmed by the server becomes a queue
//! entry. Entries are append-only, one JSON file each under
//! `queue/<doc>/<seq>`, and replay strictly in enqueue order per
//! document. A superseding edit is a new entry; the queue never rewrites
//! content in place. Only `retry_count` moves after creation.

use crate::store::{sanitize_segment, SyncStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tender_common::{ids, JsonContent};
use tokio::sync::Mutex;

/// Kind of change a queue entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Edit,
    Metadata,
    Other,
}

/// A locally-made edit awaiting server confirmation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedChange {
    pub id: String,
    pub document_id: String,
    pub change_type: ChangeType,
    pub content: JsonContent,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
}

/// On-disk representation; `seq` fixes replay order across restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChange {
    seq: u64,
    change: QueuedChange,
}

/// Ordered, durable queue of pending changes
#[derive(Debug, Clone)]
pub struct ChangeQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug)]
struct QueueInner {
    store: SyncStore,
    /// Per-document entries, seq-ascending
    pending: Mutex<HashMap<String, Vec<StoredChange>>>,
    next_seq: AtomicU64,
}

fn queue_key(document_id: &str, seq: u64) -> String {
    format!("queue/{}/{:010}", sanitize_segment(document_id), seq)
}

impl ChangeQueue {
    pub fn new(store: SyncStore) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                pending: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Load pending changes from disk, restoring enqueue order
    pub async fn load(&self) -> crate::Result<usize> {
        let keys = self.inner.store.list_keys("queue").await?;

        let mut pending: HashMap<String, Vec<StoredChange>> = HashMap::new();
        let mut max_seq = None;
        for key in keys {
            let Some(bytes) = self.inner.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<StoredChange>(&bytes) {
                Ok(stored) => {
                    max_seq = Some(max_seq.map_or(stored.seq, |m: u64| m.max(stored.seq)));
                    pending
                        .entry(stored.change.document_id.clone())
                        .or_default()
                        .push(stored);
                }
                Err(e) => {
                    tracing::warn!("Skipping corrupt queue entry {}: {}", key, e);
                }
            }
        }
        for entries in pending.values_mut() {
            entries.sort_by_key(|s| s.seq);
        }

        let count = pending.values().map(Vec::len).sum();
        self.inner
            .next_seq
            .store(max_seq.map_or(0, |m| m + 1), Ordering::SeqCst);
        *self.inner.pending.lock().await = pending;

        tracing::info!("Loaded {} pending changes from disk", count);
        Ok(count)
    }

    /// Append a change to the queue
    pub async fn queue_change(
        &self,
        document_id: &str,
        change_type: ChangeType,
        content: JsonContent,
    ) -> crate::Result<QueuedChange> {
        let change = QueuedChange {
            id: ids::change_id(),
            document_id: document_id.to_string(),
            change_type,
            content,
            timestamp: Utc::now(),
            retry_count: 0,
        };

        let mut pending = self.inner.pending.lock().await;
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
        let stored = StoredChange {
            seq,
            change: change.clone(),
        };

        let bytes = serde_json::to_vec(&stored)?;
        self.inner
            .store
            .set(&queue_key(document_id, seq), &bytes)
            .await?;
        pending
            .entry(document_id.to_string())
            .or_default()
            .push(stored);

        tracing::debug!("Queued {:?} change {} for {}", change_type, change.id, document_id);
        Ok(change)
    }

    /// Pending changes for a document, in enqueue order
    pub async fn pending_changes(&self, document_id: &str) -> Vec<QueuedChange> {
        self.inner
            .pending
            .lock()
            .await
            .get(document_id)
            .map(|entries| entries.iter().map(|s| s.change.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of pending changes for a document
    pub async fn pending_count(&self, document_id: &str) -> usize {
        self.inner
            .pending
            .lock()
            .await
            .get(document_id)
            .map_or(0, Vec::len)
    }

    pub async fn has_pending(&self, document_id: &str) -> bool {
        self.pending_count(document_id).await > 0
    }

    /// Total pending changes across all documents
    pub async fn total_pending(&self) -> usize {
        self.inner.pending.lock().await.values().map(Vec::len).sum()
    }

    /// Remove a change once the server has confirmed it
    ///
    /// Returns whether the change was present.
    pub async fn remove_change(&self, change_id: &str) -> crate::Result<bool> {
        let mut pending = self.inner.pending.lock().await;

        let found = pending.iter().find_map(|(document_id, entries)| {
            entries
                .iter()
                .position(|s| s.change.id == change_id)
                .map(|pos| (document_id.clone(), pos))
        });
        let Some((document_id, pos)) = found else {
            return Ok(false);
        };

        let (seq, now_empty) = {
            let Some(entries) = pending.get_mut(&document_id) else {
                return Ok(false);
            };
            let stored = entries.remove(pos);
            (stored.seq, entries.is_empty())
        };
        if now_empty {
            pending.remove(&document_id);
        }
        self.inner
            .store
            .delete(&queue_key(&document_id, seq))
            .await?;

        tracing::debug!("Removed change {} for {}", change_id, document_id);
        Ok(true)
    }

    /// Increment `retry_count` on every entry for a document after a
    /// failed replay
    ///
    /// Returns the number of entries touched.
    pub async fn mark_retry(&self, document_id: &str) -> crate::Result<usize> {
        let mut pending = self.inner.pending.lock().await;

        let Some(entries) = pending.get_mut(document_id) else {
            return Ok(0);
        };
        for stored in entries.iter_mut() {
            stored.change.retry_count += 1;
            let bytes = serde_json::to_vec(stored)?;
            self.inner
                .store
                .set(&queue_key(document_id, stored.seq), &bytes)
                .await?;
        }
        Ok(entries.len())
    }
}

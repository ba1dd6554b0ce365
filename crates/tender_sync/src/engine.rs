//! Sync engine orchestration
//!
//! Drives the reconnect-and-flush sequence: replays the change queue
//! through a caller-supplied endpoint, surfaces divergences as conflict
//! records, and keeps cache, queue, and connection status consistent.

use crate::{
    cache::DocumentCache,
    conflict::{detect_conflict, ConflictRegistry, SyncConflict},
    monitor::ConnectionMonitor,
    protocol::{SyncOutcome, SyncResponse},
    queue::{ChangeQueue, QueuedChange},
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tender_common::{sanitizer::LogSanitizer, JsonContent};

/// Main sync engine
#[derive(Clone)]
pub struct SyncEngine {
    cache: DocumentCache,
    queue: ChangeQueue,
    registry: ConflictRegistry,
    monitor: ConnectionMonitor,
    /// Documents with a replay currently in flight
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Removes the document from the in-flight set when the cycle ends,
/// whichever way it ends
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    document_id: String,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, document_id: &str) -> Option<Self> {
        let mut guard = match set.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !guard.insert(document_id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            document_id: document_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut guard = match self.set.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.remove(&self.document_id);
    }
}

impl SyncEngine {
    pub fn new(
        cache: DocumentCache,
        queue: ChangeQueue,
        registry: ConflictRegistry,
        monitor: ConnectionMonitor,
    ) -> Self {
        Self {
            cache,
            queue,
            registry,
            monitor,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replay a document's pending changes through `sync_fn`
    ///
    /// At most one replay per document runs at a time; a second call
    /// while one is in flight coalesces into a no-op. Calling with
    /// nothing pending and no open conflict is also a no-op — `sync_fn`
    /// is not invoked. A document with an open unresolved conflict is
    /// not replayed; the open conflict is returned instead.
    ///
    /// `sync_fn` failures are folded into `SyncOutcome { success: false }`
    /// and retried through the connection backoff path; `Err` from this
    /// method means a local storage fault.
    pub async fn sync<F, Fut>(&self, document_id: &str, sync_fn: F) -> crate::Result<SyncOutcome>
    where
        F: FnOnce(Vec<QueuedChange>) -> Fut,
        Fut: Future<Output = crate::Result<SyncResponse>>,
    {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, document_id) else {
            tracing::debug!("Sync already in flight for {}, coalescing", document_id);
            return Ok(SyncOutcome::clean());
        };

        if let Some(open) = self.registry.for_document(document_id) {
            tracing::warn!(
                "Sync for {} blocked on unresolved conflict {}",
                document_id,
                open.id
            );
            return Ok(SyncOutcome::blocked(vec![open]));
        }

        let pending = self.queue.pending_changes(document_id).await;
        if pending.is_empty() {
            tracing::debug!("Nothing pending for {}, sync is a no-op", document_id);
            return Ok(SyncOutcome::clean());
        }

        self.monitor.begin_sync();
        tracing::info!("Replaying {} changes for {}", pending.len(), document_id);

        match sync_fn(pending.clone()).await {
            Ok(response) if response.success && response.conflicts.is_empty() => {
                for change in &pending {
                    self.queue.remove_change(&change.id).await?;
                }
                self.cache.mark_synced(document_id).await?;
                self.monitor.finish_sync();
                tracing::info!("Sync complete for {}", document_id);
                Ok(SyncOutcome::clean())
            }
            Ok(response) if response.success => {
                // Server applied the replay but reports divergence: keep
                // the unconfirmed local edits queued and stay in the
                // syncing state until the user resolves.
                let opened: Vec<SyncConflict> = response
                    .conflicts
                    .into_iter()
                    .map(|conflict| self.registry.open(conflict))
                    .collect();
                tracing::warn!(
                    "Sync for {} surfaced {} conflict(s)",
                    document_id,
                    opened.len()
                );
                Ok(SyncOutcome {
                    success: true,
                    conflicts: opened,
                })
            }
            Ok(_) => {
                let touched = self.queue.mark_retry(document_id).await?;
                self.monitor.sync_failed();
                tracing::warn!(
                    "Server rejected replay for {}, {} change(s) kept for retry",
                    document_id,
                    touched
                );
                Ok(SyncOutcome::failed())
            }
            Err(e) => {
                let touched = self.queue.mark_retry(document_id).await?;
                self.monitor.sync_failed();
                // Endpoint errors can echo URLs and auth material
                tracing::warn!(
                    "Replay failed for {}: {} ({} change(s) kept for retry)",
                    document_id,
                    LogSanitizer::new().redact(&e.to_string()),
                    touched
                );
                Ok(SyncOutcome::failed())
            }
        }
    }

    /// Reconcile freshly-delivered server content against the local
    /// cache
    ///
    /// Called once per document per reconnect cycle. Returns the open
    /// conflict when the two diverge; repeated detection while a
    /// conflict is open returns the existing record.
    pub async fn apply_server_content(
        &self,
        document_id: &str,
        server_content: JsonContent,
    ) -> crate::Result<Option<SyncConflict>> {
        let Some(cached) = self.cache.cached_document(document_id).await? else {
            // Nothing local: adopt the server version as the baseline
            self.cache.cache_document(document_id, server_content).await?;
            self.cache.mark_synced(document_id).await?;
            return Ok(None);
        };

        match detect_conflict(document_id, &cached.content, &server_content) {
            Some(conflict) => {
                let opened = self.registry.open(conflict);
                Ok(Some(opened))
            }
            None => {
                tracing::debug!("Server content for {} matches local cache", document_id);
                Ok(None)
            }
        }
    }

    pub async fn has_pending_changes(&self, document_id: &str) -> bool {
        self.queue.has_pending(document_id).await
    }

    pub async fn pending_count(&self, document_id: &str) -> usize {
        self.queue.pending_count(document_id).await
    }

    /// A document is synced when nothing is pending and no conflict is
    /// open
    pub async fn is_document_synced(&self, document_id: &str) -> bool {
        self.queue.pending_count(document_id).await == 0
            && self.registry.for_document(document_id).is_none()
    }

    /// Open conflict for a document, if any
    pub fn open_conflict(&self, document_id: &str) -> Option<SyncConflict> {
        self.registry.for_document(document_id)
    }

    /// All open conflicts across documents
    pub fn all_conflicts(&self) -> Vec<SyncConflict> {
        self.registry.all()
    }
}

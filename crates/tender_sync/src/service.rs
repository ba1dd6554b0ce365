//! Sync service context
//!
//! One `SyncService` is constructed at startup and injected into every
//! consumer (editor surfaces, status indicators, the transport owner).
//! It bundles the store, cache, queue, monitor, registry, engine, and
//! resolver behind a cheaply cloneable handle; clones share state, so
//! multiple UI surfaces editing the same document observe each other's
//! pending changes.

use crate::{
    cache::{CacheStats, CachedDocument, DocumentCache},
    conflict::{ConflictRegistry, SyncConflict},
    engine::SyncEngine,
    monitor::{
        BackoffSettings, ChannelSignal, ConnectionMonitor, ConnectionStatus, ReconnectRequest,
    },
    protocol::{SyncOutcome, SyncResponse},
    queue::{ChangeQueue, ChangeType, QueuedChange},
    resolver::{ConflictResolver, Resolution},
    store::SyncStore,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tender_common::JsonContent;
use tender_config::Config;
use tokio::sync::{mpsc, watch};

/// Shared sync context for one workspace
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: Config,
    cache: DocumentCache,
    queue: ChangeQueue,
    monitor: ConnectionMonitor,
    registry: ConflictRegistry,
    engine: SyncEngine,
    resolver: ConflictResolver,
    reconnect_rx: Mutex<Option<mpsc::UnboundedReceiver<ReconnectRequest>>>,
}

impl SyncService {
    /// Build the service from configuration and reload durable state
    pub async fn start(config: Config) -> crate::Result<Self> {
        config.validate()?;

        let store = SyncStore::new(config.storage_dir());
        let cache = DocumentCache::new(store.clone());
        let queue = ChangeQueue::new(store);
        let restored = queue.load().await?;

        let (monitor, reconnect_rx) =
            ConnectionMonitor::new(BackoffSettings::from_config(&config.connection));
        monitor.spawn_reconciler(config.connection.reconcile_interval());

        let registry = ConflictRegistry::new();
        let engine = SyncEngine::new(
            cache.clone(),
            queue.clone(),
            registry.clone(),
            monitor.clone(),
        );
        let resolver = ConflictResolver::new(cache.clone(), registry.clone());

        tracing::info!(
            "Sync service started ({} pending change(s) restored)",
            restored
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                cache,
                queue,
                monitor,
                registry,
                engine,
                resolver,
                reconnect_rx: Mutex::new(Some(reconnect_rx)),
            }),
        })
    }

    /// Take the reconnect-request receiver for the transport owner
    ///
    /// Yields `Some` exactly once.
    pub fn take_reconnect_requests(&self) -> Option<mpsc::UnboundedReceiver<ReconnectRequest>> {
        self.inner
            .reconnect_rx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
    }

    // ===== Connection =====

    pub fn status(&self) -> ConnectionStatus {
        self.inner.monitor.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.monitor.subscribe()
    }

    pub fn handle_signal(&self, signal: ChannelSignal) {
        self.inner.monitor.handle_signal(signal);
    }

    pub fn reconnect(&self) {
        self.inner.monitor.reconnect();
    }

    pub fn connection_error(&self) -> Option<String> {
        self.inner.monitor.last_error()
    }

    // ===== Editing =====

    /// Record a local edit: always cache it, and queue it when offline
    /// (or always, when `sync.queue_while_online` is set)
    ///
    /// Returns the queue entry when one was created.
    pub async fn record_edit(
        &self,
        document_id: &str,
        change_type: ChangeType,
        content: JsonContent,
    ) -> crate::Result<Option<QueuedChange>> {
        self.inner
            .cache
            .cache_document(document_id, content.clone())
            .await?;

        let should_queue = self.status() != ConnectionStatus::Connected
            || self.inner.config.sync.queue_while_online;
        if !should_queue {
            return Ok(None);
        }

        let change = self
            .inner
            .queue
            .queue_change(document_id, change_type, content)
            .await?;
        Ok(Some(change))
    }

    /// Queue a change unconditionally
    pub async fn queue_change(
        &self,
        document_id: &str,
        change_type: ChangeType,
        content: JsonContent,
    ) -> crate::Result<QueuedChange> {
        self.inner
            .queue
            .queue_change(document_id, change_type, content)
            .await
    }

    // ===== Cache =====

    pub async fn cache_document(
        &self,
        document_id: &str,
        content: JsonContent,
    ) -> crate::Result<CachedDocument> {
        self.inner.cache.cache_document(document_id, content).await
    }

    pub async fn cached_document(
        &self,
        document_id: &str,
    ) -> crate::Result<Option<CachedDocument>> {
        self.inner.cache.cached_document(document_id).await
    }

    pub async fn clear_document_cache(&self, document_id: &str) -> crate::Result<()> {
        self.inner.cache.clear_document(document_id).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats().await
    }

    // ===== Sync =====

    /// Replay a document's queue through the caller's server endpoint
    pub async fn sync<F, Fut>(&self, document_id: &str, sync_fn: F) -> crate::Result<SyncOutcome>
    where
        F: FnOnce(Vec<QueuedChange>) -> Fut,
        Fut: Future<Output = crate::Result<SyncResponse>>,
    {
        self.inner.engine.sync(document_id, sync_fn).await
    }

    /// Reconcile server-delivered content against the local cache
    pub async fn apply_server_content(
        &self,
        document_id: &str,
        server_content: JsonContent,
    ) -> crate::Result<Option<SyncConflict>> {
        self.inner
            .engine
            .apply_server_content(document_id, server_content)
            .await
    }

    pub async fn has_pending_changes(&self, document_id: &str) -> bool {
        self.inner.engine.has_pending_changes(document_id).await
    }

    pub async fn pending_count(&self, document_id: &str) -> usize {
        self.inner.engine.pending_count(document_id).await
    }

    pub async fn total_pending(&self) -> usize {
        self.inner.queue.total_pending().await
    }

    pub async fn is_document_synced(&self, document_id: &str) -> bool {
        self.inner.engine.is_document_synced(document_id).await
    }

    // ===== Conflicts =====

    pub fn open_conflict(&self, document_id: &str) -> Option<SyncConflict> {
        self.inner.registry.for_document(document_id)
    }

    pub fn all_conflicts(&self) -> Vec<SyncConflict> {
        self.inner.registry.all()
    }

    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolution: Resolution,
    ) -> crate::Result<CachedDocument> {
        self.inner.resolver.resolve(conflict_id, resolution).await
    }

    pub async fn resolve_conflict_content(
        &self,
        conflict_id: &str,
        content: JsonContent,
    ) -> crate::Result<CachedDocument> {
        self.inner.resolver.resolve_content(conflict_id, content).await
    }

    /// Abort owned background tasks
    pub fn shutdown(&self) {
        self.inner.monitor.shutdown();
        tracing::info!("Sync service shut down");
    }
}

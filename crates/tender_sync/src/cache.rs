//! Local document cache
//!
//! Persists the last-known content of each proposal document so offline
//! edits survive a reload or relaunch. Writes are last-writer-wins per
//! document; merging divergent versions is the resolver's job, never the
//! cache's.

use crate::store::{sanitize_segment, SyncStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tender_common::JsonContent;
use tokio::sync::Mutex;

/// Cached snapshot of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedDocument {
    pub document_id: String,
    pub content: JsonContent,
    pub cached_at: DateTime<Utc>,
    /// Marker bumped on every confirmed sync; a snapshot whose marker
    /// never moved since the disconnect is a divergence candidate
    pub synced_version: u64,
    /// SHA256 of the serialized content
    pub content_hash: String,
}

/// Document cache manager
#[derive(Debug, Clone)]
pub struct DocumentCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    store: SyncStore,
    entries: Mutex<HashMap<String, CachedDocument>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

fn hash_content(content: &JsonContent) -> crate::Result<String> {
    let bytes = serde_json::to_vec(content)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn cache_key(document_id: &str) -> String {
    format!("documents/{}", sanitize_segment(document_id))
}

impl DocumentCache {
    pub fn new(store: SyncStore) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                entries: Mutex::new(HashMap::new()),
                hits: AtomicUsize::new(0),
                misses: AtomicUsize::new(0),
            }),
        }
    }

    /// Cache the latest local content for a document
    ///
    /// Overwrites any previous snapshot. `synced_version` carries over;
    /// it only moves on `mark_synced`.
    pub async fn cache_document(
        &self,
        document_id: &str,
        content: JsonContent,
    ) -> crate::Result<CachedDocument> {
        let content_hash = hash_content(&content)?;
        let mut entries = self.inner.entries.lock().await;

        if let Some(existing) = entries.get_mut(document_id) {
            if existing.content_hash == content_hash {
                tracing::trace!("Content unchanged for {}, skipping write", document_id);
                existing.cached_at = Utc::now();
                return Ok(existing.clone());
            }
        }

        let entry = CachedDocument {
            document_id: document_id.to_string(),
            content,
            cached_at: Utc::now(),
            synced_version: entries.get(document_id).map_or(0, |e| e.synced_version),
            content_hash,
        };

        let bytes = serde_json::to_vec(&entry)?;
        self.inner.store.set(&cache_key(document_id), &bytes).await?;
        entries.insert(document_id.to_string(), entry.clone());

        tracing::debug!("Cached document {}", document_id);
        Ok(entry)
    }

    /// Get the cached snapshot for a document, if any
    pub async fn cached_document(
        &self,
        document_id: &str,
    ) -> crate::Result<Option<CachedDocument>> {
        let mut entries = self.inner.entries.lock().await;

        if let Some(entry) = entries.get(document_id) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(entry.clone()));
        }

        let key = cache_key(document_id);
        match self.inner.store.get(&key).await? {
            Some(bytes) => match serde_json::from_slice::<CachedDocument>(&bytes) {
                Ok(entry) => {
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    entries.insert(document_id.to_string(), entry.clone());
                    Ok(Some(entry))
                }
                Err(e) => {
                    tracing::warn!("Corrupt cache entry for {}: {}", document_id, e);
                    // Auto-repair: drop the corrupt entry
                    self.inner.store.delete(&key).await?;
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            },
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Bump the synced-version marker after a confirmed sync
    ///
    /// Returns the new version, or `None` when the document is not cached.
    pub async fn mark_synced(&self, document_id: &str) -> crate::Result<Option<u64>> {
        // Pull the entry into memory first; it may only exist on disk
        if self.cached_document(document_id).await?.is_none() {
            return Ok(None);
        }

        let mut entries = self.inner.entries.lock().await;
        let entry = match entries.get_mut(document_id) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        entry.synced_version += 1;

        let bytes = serde_json::to_vec(entry)?;
        self.inner.store.set(&cache_key(document_id), &bytes).await?;
        Ok(Some(entry.synced_version))
    }

    /// Drop a document from the cache, memory and disk
    pub async fn clear_document(&self, document_id: &str) -> crate::Result<()> {
        let mut entries = self.inner.entries.lock().await;
        entries.remove(document_id);
        self.inner.store.delete(&cache_key(document_id)).await?;
        tracing::debug!("Cleared cache for {}", document_id);
        Ok(())
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.inner.entries.lock().await.len();
        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        CacheStats {
            entries,
            hits,
            misses,
            hit_rate: if hits + misses > 0 {
                (hits as f64) / ((hits + misses) as f64)
            } else {
                0.0
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

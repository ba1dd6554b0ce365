//! Conflict resolution
//!
//! Applies the user's chosen resolution to an open conflict: the local
//! version, the server version, or a merged value the caller built.
//! The resolver only guarantees the cache ends up holding the resolved
//! content and the conflict record is gone; pending queue entries stay
//! queued until a subsequent successful sync confirms them.

use crate::cache::{CachedDocument, DocumentCache};
use crate::conflict::ConflictRegistry;
use crate::SyncError;
use tender_common::JsonContent;

/// The user's choice for an open conflict
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Keep the locally cached version
    KeepLocal,

    /// Accept the server's version
    KeepServer,

    /// A caller-constructed merge of both
    Merged(JsonContent),
}

/// Applies resolutions to open conflicts
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    cache: DocumentCache,
    registry: ConflictRegistry,
}

impl ConflictResolver {
    pub fn new(cache: DocumentCache, registry: ConflictRegistry) -> Self {
        Self { cache, registry }
    }

    /// Resolve an open conflict
    ///
    /// Returns the new cached snapshot. Unknown conflict IDs are an
    /// error; a conflict is only removable once.
    pub async fn resolve(
        &self,
        conflict_id: &str,
        resolution: Resolution,
    ) -> crate::Result<CachedDocument> {
        let conflict = self
            .registry
            .take(conflict_id)
            .ok_or_else(|| SyncError::UnknownConflict(conflict_id.to_string()))?;

        let resolved = match resolution {
            Resolution::KeepLocal => conflict.local_content.clone(),
            Resolution::KeepServer => conflict.server_content.clone(),
            Resolution::Merged(content) => content,
        };

        match self.cache.cache_document(&conflict.document_id, resolved).await {
            Ok(entry) => {
                tracing::info!(
                    "Resolved conflict {} for {}",
                    conflict_id,
                    conflict.document_id
                );
                Ok(entry)
            }
            Err(e) => {
                // The cache write failed locally; reinstate the conflict
                // so the resolution can be retried.
                self.registry.open(conflict);
                Err(e)
            }
        }
    }

    /// Resolve with an explicit content value
    pub async fn resolve_content(
        &self,
        conflict_id: &str,
        content: JsonContent,
    ) -> crate::Result<CachedDocument> {
        self.resolve(conflict_id, Resolution::Merged(content)).await
    }

    /// Keep the locally cached version
    pub async fn keep_local(&self, conflict_id: &str) -> crate::Result<CachedDocument> {
        self.resolve(conflict_id, Resolution::KeepLocal).await
    }

    /// Accept the server's version
    pub async fn keep_server(&self, conflict_id: &str) -> crate::Result<CachedDocument> {
        self.resolve(conflict_id, Resolution::KeepServer).await
    }
}

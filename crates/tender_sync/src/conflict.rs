//! Divergence detection between local and server document versions
//!
//! A conflict is data, not an error: it captures both snapshots and
//! waits for an explicit user resolution. Detection is structural deep
//! comparison of the opaque content trees; the sync layer never ranks
//! one side over the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tender_common::{ids, JsonContent};

/// A detected divergence awaiting user resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConflict {
    pub id: String,
    pub document_id: String,
    pub local_content: JsonContent,
    pub server_content: JsonContent,
    pub detected_at: DateTime<Utc>,
}

/// Compare local and server content for a document
///
/// Returns `None` when the two are structurally equal (the local edit
/// was itself the source of the server state), otherwise a conflict
/// capturing both snapshots verbatim. Neither input is mutated.
pub fn detect_conflict(
    document_id: &str,
    local: &JsonContent,
    server: &JsonContent,
) -> Option<SyncConflict> {
    if local == server {
        return None;
    }

    Some(SyncConflict {
        id: ids::conflict_id(),
        document_id: document_id.to_string(),
        local_content: local.clone(),
        server_content: server.clone(),
        detected_at: Utc::now(),
    })
}

/// Open conflicts, at most one per document
///
/// Re-detecting a conflict for a document that already has one open is
/// idempotent: the existing record wins until it is resolved.
#[derive(Debug, Clone, Default)]
pub struct ConflictRegistry {
    by_document: Arc<Mutex<HashMap<String, SyncConflict>>>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a detected conflict, deduplicating per document
    ///
    /// Returns the open conflict for the document: the existing one if
    /// present, otherwise the one just registered.
    pub fn open(&self, conflict: SyncConflict) -> SyncConflict {
        let mut by_document = match self.by_document.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match by_document.get(&conflict.document_id) {
            Some(existing) => {
                tracing::debug!(
                    "Conflict already open for {}, keeping {}",
                    conflict.document_id,
                    existing.id
                );
                existing.clone()
            }
            None => {
                tracing::warn!(
                    "Conflict {} opened for {}",
                    conflict.id,
                    conflict.document_id
                );
                by_document.insert(conflict.document_id.clone(), conflict.clone());
                conflict
            }
        }
    }

    /// Open conflict for a document, if any
    pub fn for_document(&self, document_id: &str) -> Option<SyncConflict> {
        self.lock().get(document_id).cloned()
    }

    /// Remove and return a conflict by its ID
    pub fn take(&self, conflict_id: &str) -> Option<SyncConflict> {
        let mut by_document = self.lock();
        let document_id = by_document
            .iter()
            .find(|(_, c)| c.id == conflict_id)
            .map(|(doc, _)| doc.clone())?;
        by_document.remove(&document_id)
    }

    /// All open conflicts
    pub fn all(&self) -> Vec<SyncConflict> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SyncConflict>> {
        match self.by_document.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

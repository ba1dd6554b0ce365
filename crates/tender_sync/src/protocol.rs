//! Server endpoint seam types
//!
//! The engine is transport-agnostic: the caller supplies a replay
//! function that ships queued changes to the server (GraphQL mutation,
//! HTTP, RPC) and answers with a `SyncResponse`. These types are the
//! whole wire contract.

use crate::conflict::SyncConflict;
use serde::{Deserialize, Serialize};

/// Server's answer to a replay of queued changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,

    /// Divergences the server detected while applying the replay
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<SyncConflict>,
}

impl SyncResponse {
    /// Successful replay, nothing diverged
    pub fn ok() -> Self {
        Self {
            success: true,
            conflicts: Vec::new(),
        }
    }

    /// Successful replay with server-reported divergences
    pub fn with_conflicts(conflicts: Vec<SyncConflict>) -> Self {
        Self {
            success: true,
            conflicts,
        }
    }
}

/// Result of one engine sync cycle
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub success: bool,
    pub conflicts: Vec<SyncConflict>,
}

impl SyncOutcome {
    pub(crate) fn clean() -> Self {
        Self {
            success: true,
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn failed() -> Self {
        Self {
            success: false,
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn blocked(conflicts: Vec<SyncConflict>) -> Self {
        Self {
            success: false,
            conflicts,
        }
    }

    /// Replay confirmed and nothing left to resolve
    pub fn is_clean(&self) -> bool {
        self.success && self.conflicts.is_empty()
    }
}

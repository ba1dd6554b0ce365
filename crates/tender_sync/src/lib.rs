//! # TenderDesk Sync Core
//!
//! Offline synchronization and conflict resolution for collaboratively
//! edited proposal documents.
//!
//! ## Architecture
//!
//! - **Durable store**: per-key JSON files, atomic writes, restart-safe
//! - **Document cache**: last-known content per document while offline
//! - **Change queue**: FIFO replay log of unconfirmed local edits
//! - **Connection monitor**: transport status with capped exponential backoff
//! - **Sync engine**: drains the queue against a caller-supplied endpoint
//! - **Conflict resolution**: divergent versions surfaced as data, resolved
//!   by explicit user choice
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tender_config::Config;
//! use tender_sync::{ChangeType, SyncResponse, SyncService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(std::path::Path::new("."))?;
//!     let service = SyncService::start(config).await?;
//!
//!     // An edit made while disconnected is cached and queued.
//!     let _queued = service
//!         .record_edit("prop-42", ChangeType::Edit, serde_json::json!({"text": "draft"}))
//!         .await?;
//!
//!     // On reconnect, replay the queue through your server endpoint.
//!     let outcome = service
//!         .sync("prop-42", |_changes| async move {
//!             Ok::<_, tender_sync::SyncError>(SyncResponse::ok())
//!         })
//!         .await?;
//!     assert!(outcome.is_clean());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod conflict;
pub mod engine;
pub mod monitor;
pub mod protocol;
pub mod queue;
pub mod resolver;
pub mod service;
pub mod store;

pub use cache::{CacheStats, CachedDocument, DocumentCache};
pub use conflict::{detect_conflict, ConflictRegistry, SyncConflict};
pub use engine::SyncEngine;
pub use monitor::{
    BackoffSettings, ChannelSignal, ConnectionMonitor, ConnectionStatus, ReconnectRequest,
};
pub use protocol::{SyncOutcome, SyncResponse};
pub use queue::{ChangeQueue, ChangeType, QueuedChange};
pub use resolver::{ConflictResolver, Resolution};
pub use service::SyncService;
pub use store::SyncStore;

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown conflict: {0}")]
    UnknownConflict(String),

    #[error("Replay failed: {0}")]
    Replay(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] anyhow::Error),
}

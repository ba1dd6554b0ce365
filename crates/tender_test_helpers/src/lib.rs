//! Test helpers for TenderDesk
//!
//! Shared scaffolding for unit and integration tests: quiet tracing
//! setup, throwaway workspaces, and proposal-document content builders.

pub mod content;
pub mod logging;
pub mod workspace;

pub use workspace::TempWorkspace;

//! Common types and errors for TenderDesk
//!
//! This crate provides shared data structures used across all TenderDesk
//! components: the error taxonomy, telemetry initialization, log
//! redaction, and identifier generation.

pub mod ids;
pub mod sanitizer;
pub mod telemetry;

use thiserror::Error;

/// Opaque document content.
///
/// Proposal documents are recursively-structured trees of typed nodes
/// (paragraphs, tables, marks, attributes). The sync layer never
/// interprets node semantics; it only needs deep comparison and
/// serialization, which `serde_json::Value` provides.
pub type JsonContent = serde_json::Value;

/// Core error types for TenderDesk operations
#[derive(Error, Debug)]
pub enum TenderError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TenderError>;

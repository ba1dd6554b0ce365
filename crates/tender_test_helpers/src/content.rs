//! Proposal-document content builders
//!
//! Documents are trees of typed nodes in the editor's JSON shape. Tests
//! only need small, realistic instances.

use serde_json::{json, Value};

/// A one-paragraph proposal document
pub fn doc(text: &str) -> Value {
    json!({
        "type": "doc",
        "content": [paragraph(text)],
    })
}

/// A paragraph node containing a single text run
pub fn paragraph(text: &str) -> Value {
    json!({
        "type": "paragraph",
        "content": [{"type": "text", "text": text}],
    })
}

/// A document with several paragraphs
pub fn doc_with_paragraphs(texts: &[&str]) -> Value {
    json!({
        "type": "doc",
        "content": texts.iter().map(|t| paragraph(t)).collect::<Vec<_>>(),
    })
}

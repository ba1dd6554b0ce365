//! Durable key-value store backing the cache and change queue
//!
//! One JSON file per key under the sync storage root. Writes go through
//! a temp file and rename, so a key is either fully written or untouched.
//! Keys are slash-separated (`documents/<doc>`, `queue/<doc>/<seq>`) and
//! map directly onto subdirectories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-backed async key-value store
#[derive(Debug, Clone)]
pub struct SyncStore {
    root: PathBuf,
}

impl SyncStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut segments = key.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                // Append rather than set_extension: identifiers may contain dots
                path.push(format!("{}.json", segment));
            } else {
                path.push(segment);
            }
        }
        path
    }

    /// Read the value for a key, `None` if absent
    pub async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a key atomically (temp file + rename)
    pub async fn set(&self, key: &str, bytes: &[u8]) -> crate::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => path.with_file_name(format!("{}.tmp", name)),
            None => path.with_extension("tmp"),
        };
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;

        tracing::trace!("Stored key {}", key);
        Ok(())
    }

    /// Delete a key; deleting an absent key is a no-op
    pub async fn delete(&self, key: &str) -> crate::Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List keys under a prefix, sorted lexicographically
    pub async fn list_keys(&self, prefix: &str) -> crate::Result<Vec<String>> {
        let mut dir = self.root.clone();
        for segment in prefix.split('/') {
            dir.push(segment);
        }
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut stack = vec![dir];
        while let Some(current) = stack.pop() {
            let mut entries = fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    if let Ok(rel) = path.with_extension("").strip_prefix(&self.root) {
                        keys.push(rel.to_string_lossy().replace('\\', "/"));
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Make an identifier safe for use as a path segment
pub(crate) fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

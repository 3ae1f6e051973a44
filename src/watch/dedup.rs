//! Dedup state for watchers
//!
//! Two flavors: a durable set persisted as a whole-file JSON overwrite
//! (small set, infrequent writes), and a volatile in-memory set that is
//! empty at process start. Membership is add-only in both.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// On-disk shape of the durable set.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProcessedFile {
    links: Vec<String>,
}

/// Durable set of already-surfaced identifiers, backed by a JSON file.
pub struct ProcessedStore {
    path: PathBuf,
}

impl ProcessedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted set. A missing or corrupt file yields an empty
    /// set with a warning; loading never fails.
    pub async fn load(&self) -> HashSet<String> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashSet::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read dedup file, starting empty");
                return HashSet::new();
            }
        };

        match serde_json::from_str::<ProcessedFile>(&raw) {
            Ok(file) => file.links.into_iter().collect(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt dedup file, starting empty");
                HashSet::new()
            }
        }
    }

    /// Add `identifier` to the set and rewrite the whole file.
    ///
    /// A write failure is logged but the in-memory set keeps the addition,
    /// so the item stays suppressed for the rest of the process lifetime.
    /// Across a restart it may be re-announced if the write never landed.
    pub async fn commit(&self, identifier: &str, set: &mut HashSet<String>) {
        set.insert(identifier.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    tracing::error!(path = %self.path.display(), error = %e, "Failed to create dedup directory");
                    return;
                }
            }
        }

        let mut links: Vec<String> = set.iter().cloned().collect();
        links.sort();
        let file = ProcessedFile { links };

        let payload = match serde_json::to_vec_pretty(&file) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize dedup set");
                return;
            }
        };

        match tokio::fs::write(&self.path, payload).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), identifier, "Dedup file updated");
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to write dedup file");
            }
        }
    }
}

/// Volatile set of already-surfaced identifiers. Empty at process start.
#[derive(Default)]
pub struct SeenSet {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seen(&self, identifier: &str) -> bool {
        self.inner.read().await.contains(identifier)
    }

    pub async fn mark_seen(&self, identifier: &str) {
        self.inner.write().await.insert(identifier.to_string());
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_file_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path().join("nope.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let store = ProcessedStore::new(&path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_then_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        let store = ProcessedStore::new(&path);

        let mut set = HashSet::new();
        store.commit("A", &mut set).await;
        store.commit("B", &mut set).await;

        let reloaded = store.load().await;
        assert_eq!(reloaded, ["A", "B"].iter().map(|s| s.to_string()).collect());

        store.commit("C", &mut set).await;
        let reloaded = store.load().await;
        assert_eq!(reloaded.len(), 3);
        assert!(reloaded.contains("C"));
    }

    #[tokio::test]
    async fn test_commit_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/processed.json");
        let store = ProcessedStore::new(&path);

        let mut set = HashSet::new();
        store.commit("A", &mut set).await;

        assert!(path.exists());
        assert!(store.load().await.contains("A"));
    }

    #[tokio::test]
    async fn test_commit_keeps_memory_on_write_failure() {
        // Point the store at a path that cannot be a file.
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path());

        let mut set = HashSet::new();
        store.commit("A", &mut set).await;
        assert!(set.contains("A"));
    }

    #[tokio::test]
    async fn test_seen_set_is_monotonic() {
        let seen = SeenSet::new();
        assert!(!seen.seen("CVE-2026-0001").await);

        seen.mark_seen("CVE-2026-0001").await;
        assert!(seen.seen("CVE-2026-0001").await);

        seen.mark_seen("CVE-2026-0001").await;
        assert_eq!(seen.len().await, 1);
    }
}

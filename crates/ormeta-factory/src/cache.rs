//! Metadata cache contract.
//!
//! A [`MetadataCache`] stores finished class metadata across factory
//! instances. Snapshots carry no runtime binding: the factory re-attaches the
//! reflection handle and rebuilds the value generation plan on fetch.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use ormeta_core::ClassMetadata;

/// Storage for serialized class metadata.
pub trait MetadataCache: Send + Sync + fmt::Debug {
    /// Fetch a snapshot. Unusable entries are reported as misses.
    fn fetch(&self, key: &str) -> Option<ClassMetadata>;

    /// Store a snapshot. Returns `false` if the entry could not be saved.
    fn save(&self, key: &str, metadata: &ClassMetadata) -> bool;

    /// Remove an entry.
    fn delete(&self, key: &str);
}

/// Process-local cache keeping JSON snapshots.
#[derive(Debug, Default)]
pub struct InMemoryMetadataCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryMetadataCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a raw entry.
    pub fn insert_raw(&self, key: impl Into<String>, json: impl Into<String>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.into(), json.into());
        }
    }
}

impl MetadataCache for InMemoryMetadataCache {
    fn fetch(&self, key: &str) -> Option<ClassMetadata> {
        let json = self.entries.read().ok()?.get(key).cloned()?;
        match serde_json::from_str(&json) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(
                    target: "ormeta::cache",
                    key = key,
                    error = %e,
                    "Discarding unreadable metadata cache entry"
                );
                None
            }
        }
    }

    fn save(&self, key: &str, metadata: &ClassMetadata) -> bool {
        let json = match serde_json::to_string(metadata) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(
                    target: "ormeta::cache",
                    key = key,
                    error = %e,
                    "Failed to serialize class metadata"
                );
                return false;
            }
        };
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), json);
                true
            }
            Err(_) => false,
        }
    }

    fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

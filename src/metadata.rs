//! Per-vector records: payload, JSON metadata, creation timestamp.
//!
//! Vector payloads live in a map shared (read-only) with the index's
//! accessor closure, so the graph can compute distances without carrying its
//! own copy of O(N·dim) data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// String-keyed JSON metadata attached to vectors and reasoning records.
pub type JsonMap = Map<String, Value>;

/// Payload map shared between the store and the index accessor.
pub type SharedVectors = Arc<RwLock<HashMap<u64, Vec<f32>>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: u64,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: JsonMap,
    /// Unix seconds at insertion.
    pub created_at: u64,
}

struct Entry {
    metadata: JsonMap,
    created_at: u64,
}

/// Maps vector ids to their payload and metadata, iterable in insertion
/// order.
#[derive(Default)]
pub struct MetadataStore {
    vectors: SharedVectors,
    entries: HashMap<u64, Entry>,
    order: Vec<u64>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the index's vector accessor.
    pub fn shared_vectors(&self) -> SharedVectors {
        Arc::clone(&self.vectors)
    }

    pub fn insert(&mut self, id: u64, vector: Vec<f32>, metadata: JsonMap) {
        self.insert_at(id, vector, metadata, now_unix_secs());
    }

    /// Insert preserving an existing timestamp (snapshot replay).
    pub fn insert_at(&mut self, id: u64, vector: Vec<f32>, metadata: JsonMap, created_at: u64) {
        self.vectors.write().insert(id, vector);
        if self
            .entries
            .insert(
                id,
                Entry {
                    metadata,
                    created_at,
                },
            )
            .is_none()
        {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: u64) -> Option<VectorRecord> {
        let entry = self.entries.get(&id)?;
        let vector = self.vectors.read().get(&id).cloned().unwrap_or_default();
        Some(VectorRecord {
            id,
            vector,
            metadata: entry.metadata.clone(),
            created_at: entry.created_at,
        })
    }

    /// Metadata and timestamp without cloning the payload.
    pub fn metadata_of(&self, id: u64) -> Option<(&JsonMap, u64)> {
        self.entries.get(&id).map(|e| (&e.metadata, e.created_at))
    }

    pub fn delete(&mut self, id: u64) -> bool {
        if self.entries.remove(&id).is_none() {
            return false;
        }
        self.vectors.write().remove(&id);
        self.order.retain(|&other| other != id);
        true
    }

    /// Shallow merge: keys in `patch` overwrite, everything else is kept.
    /// Returns the merged map, or `None` if the id does not exist.
    pub fn update(&mut self, id: u64, patch: JsonMap) -> Option<JsonMap> {
        let entry = self.entries.get_mut(&id)?;
        for (key, value) in patch {
            entry.metadata.insert(key, value);
        }
        Some(entry.metadata.clone())
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = VectorRecord> + '_ {
        self.order.iter().filter_map(|&id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.vectors.write().clear();
        self.entries.clear();
        self.order.clear();
    }
}

pub(crate) fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

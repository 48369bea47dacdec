//! The store facade.
//!
//! [`MemoryStore`] composes the graph index, the metadata store and the
//! reasoning bank behind one API: it assigns ids, validates dimensions,
//! keeps the index and metadata in lockstep, emits lifecycle events, and
//! owns export/import.

use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::events::{Listener, StoreEvent};
use crate::hnsw::{HnswIndex, VectorAccessor};
use crate::metadata::{JsonMap, MetadataStore, SharedVectors, VectorRecord};
use crate::metric::DistanceMetric;
use crate::reasoning::{ReasoningBank, ReasoningRecord};
use crate::snapshot::{Snapshot, SNAPSHOT_VERSION};

/// One search result, hydrated from the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: u64,
    pub distance: f32,
    pub metadata: JsonMap,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub vectors: usize,
    pub deleted: usize,
    pub reasoning: usize,
    pub dimension: usize,
    pub capacity: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub metric: DistanceMetric,
    pub max_layer: usize,
    pub graph_edges: usize,
}

pub struct MemoryStore {
    config: StoreConfig,
    index: HnswIndex,
    metadata: MetadataStore,
    reasoning: ReasoningBank,
    next_id: u64,
    listeners: Vec<Listener>,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let metadata = MetadataStore::new();
        let index = HnswIndex::new(&config, vector_accessor(metadata.shared_vectors()));
        let store = Self {
            config,
            index,
            metadata,
            reasoning: ReasoningBank::new(),
            next_id: 0,
            listeners: Vec::new(),
        };
        store.emit(StoreEvent::Initialized {
            dimension: store.config.dimension,
        });
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register an observer. Callbacks run synchronously, after each
    /// mutation, in registration order.
    pub fn on_event<F>(&mut self, listener: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&self, event: StoreEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Store a vector with optional metadata; returns the assigned id.
    pub fn add_vector(
        &mut self,
        vector: Vec<f32>,
        metadata: Option<JsonMap>,
    ) -> Result<u64, StoreError> {
        if vector.len() != self.config.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimension,
                got: vector.len(),
            });
        }

        let id = self.next_id;
        let metadata = metadata.unwrap_or_default();
        // Payload first: the index reads it through the accessor while
        // wiring edges.
        self.metadata.insert(id, vector.clone(), metadata.clone());
        if let Err(err) = self.index.insert(id, &vector) {
            self.metadata.delete(id);
            return Err(err);
        }
        self.next_id += 1;

        self.emit(StoreEvent::VectorAdded { id, metadata });
        Ok(id)
    }

    /// `k` nearest live vectors, ascending by `(distance, id)`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let hits = self.index.search(query, k)?;
        let mut out = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            match self.metadata.metadata_of(id) {
                Some((metadata, created_at)) => out.push(SearchHit {
                    id,
                    distance,
                    metadata: metadata.clone(),
                    created_at,
                }),
                None => tracing::warn!(id, "search hit without a metadata record, dropping"),
            }
        }
        Ok(out)
    }

    /// Full record for an id, if it exists.
    pub fn get_vector(&self, id: u64) -> Option<VectorRecord> {
        self.metadata.get(id)
    }

    /// Remove a vector from results and from the metadata store. Returns
    /// whether it existed; repeating the call is a no-op.
    pub fn delete_vector(&mut self, id: u64) -> bool {
        let in_index = self.index.remove(id);
        let in_metadata = self.metadata.delete(id);
        let existed = in_index || in_metadata;
        if existed {
            self.emit(StoreEvent::VectorDeleted { id });
        }
        existed
    }

    /// Shallow-merge `patch` into the record's metadata. `false` if the id
    /// does not exist.
    pub fn update_metadata(&mut self, id: u64, patch: JsonMap) -> bool {
        match self.metadata.update(id, patch) {
            Some(merged) => {
                self.emit(StoreEvent::MetadataUpdated {
                    id,
                    metadata: merged,
                });
                true
            }
            None => false,
        }
    }

    pub fn add_reasoning(
        &mut self,
        context: impl Into<String>,
        reasoning: impl Into<String>,
        metadata: Option<JsonMap>,
    ) -> String {
        let id = self
            .reasoning
            .add(context, reasoning, metadata.unwrap_or_default());
        self.emit(StoreEvent::ReasoningAdded { id: id.clone() });
        id
    }

    pub fn get_reasoning(&self, id: &str) -> Option<&ReasoningRecord> {
        self.reasoning.get(id)
    }

    pub fn search_reasoning(&self, term: &str) -> Vec<&ReasoningRecord> {
        self.reasoning.search(term)
    }

    /// Adjust the query-time candidate budget. Takes effect immediately, no
    /// rebuild.
    pub fn set_ef_search(&mut self, ef_search: usize) {
        self.config.ef_search = ef_search.max(1);
        self.index.set_ef_search(self.config.ef_search);
    }

    pub fn stats(&self) -> StoreStats {
        let index = self.index.stats();
        StoreStats {
            vectors: index.live,
            deleted: index.tombstones,
            reasoning: self.reasoning.len(),
            dimension: self.config.dimension,
            capacity: self.config.capacity,
            m: index.m,
            ef_construction: index.ef_construction,
            ef_search: index.ef_search,
            metric: self.config.metric,
            max_layer: index.max_layer,
            graph_edges: index.edges,
        }
    }

    /// Drop everything and reset the id counter. Observers see a single
    /// `Cleared` event once the store is already empty.
    pub fn clear(&mut self) {
        self.metadata.clear();
        self.reasoning.clear();
        self.index = HnswIndex::new(&self.config, vector_accessor(self.metadata.shared_vectors()));
        self.next_id = 0;
        tracing::debug!("store cleared");
        self.emit(StoreEvent::Cleared);
    }

    /// Serializable copy of the whole store: config, id counter, live
    /// vector records, reasoning bank.
    pub fn export(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            next_id: self.next_id,
            vectors: self.metadata.iter().collect(),
            reasoning: self.reasoning.iter().cloned().collect(),
        }
    }

    /// Replace the whole store with the snapshot's contents. The index is
    /// rebuilt by replaying inserts, never deserialized. All-or-nothing: a
    /// malformed snapshot leaves the current state untouched.
    pub fn import(&mut self, snapshot: Snapshot) -> Result<(), StoreError> {
        snapshot.validate(self.config.dimension)?;

        let config = snapshot.config.clone();
        let mut metadata = MetadataStore::new();
        let mut index = HnswIndex::new(&config, vector_accessor(metadata.shared_vectors()));
        for record in &snapshot.vectors {
            metadata.insert_at(
                record.id,
                record.vector.clone(),
                record.metadata.clone(),
                record.created_at,
            );
            index.insert(record.id, &record.vector)?;
        }
        let mut reasoning = ReasoningBank::new();
        for record in snapshot.reasoning {
            reasoning.restore(record);
        }

        let vectors = metadata.len();
        let reasoning_count = reasoning.len();
        self.config = config;
        self.metadata = metadata;
        self.index = index;
        self.reasoning = reasoning;
        self.next_id = snapshot.next_id;

        tracing::debug!(vectors, reasoning = reasoning_count, "snapshot imported");
        self.emit(StoreEvent::SnapshotImported {
            vectors,
            reasoning: reasoning_count,
        });
        Ok(())
    }
}

fn vector_accessor(vectors: SharedVectors) -> VectorAccessor {
    Box::new(move |id, sink| {
        if let Some(vector) = vectors.read().get(&id) {
            sink(vector);
        }
    })
}

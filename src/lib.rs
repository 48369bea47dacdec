//! engram-db — an in-process vector store for AI-agent memory.
//!
//! Ingests fixed-dimension embedding vectors with JSON metadata, answers
//! approximate nearest-neighbor queries over an HNSW graph, and keeps a
//! keyed bank of free-text reasoning records with substring search.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   MemoryStore (facade)                      │
//! │     id assignment · dimension checks · events · snapshot    │
//! ├──────────────────┬──────────────────────┬───────────────────┤
//! │    HnswIndex     │    MetadataStore     │   ReasoningBank   │
//! │  layered graph   │  records + payloads  │  free-text notes  │
//! └──────────────────┴──────────────────────┴───────────────────┘
//!                    ▲              │
//!                    └── accessor ──┘  (payloads read in place,
//!                                       never duplicated)
//! ```
//!
//! # Example
//!
//! ```
//! use engram_db::{MemoryStore, StoreConfig};
//!
//! let mut store = MemoryStore::new(StoreConfig::with_dimension(4))?;
//! let id = store.add_vector(vec![1.0, 0.0, 0.0, 0.0], None)?;
//! let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 1)?;
//! assert_eq!(hits[0].id, id);
//! # Ok::<(), engram_db::StoreError>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod hnsw;
pub mod metadata;
pub mod metric;
pub mod reasoning;
pub mod snapshot;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use events::StoreEvent;
pub use hnsw::{HnswIndex, IndexStats};
pub use metadata::{JsonMap, VectorRecord};
pub use metric::DistanceMetric;
pub use reasoning::ReasoningRecord;
pub use snapshot::Snapshot;
pub use store::{MemoryStore, SearchHit, StoreStats};

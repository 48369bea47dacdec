//! Lifecycle notifications.
//!
//! Events fire synchronously, in program order, strictly after the mutation
//! they describe has been applied — an observer can always query the state
//! an event refers to.

use crate::metadata::JsonMap;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Initialized { dimension: usize },
    VectorAdded { id: u64, metadata: JsonMap },
    VectorDeleted { id: u64 },
    MetadataUpdated { id: u64, metadata: JsonMap },
    ReasoningAdded { id: String },
    Cleared,
    SnapshotImported { vectors: usize, reasoning: usize },
}

/// Registered observer callback.
pub type Listener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

//! HNSW (Hierarchical Navigable Small World) index.
//!
//! A multi-layer proximity graph for approximate nearest-neighbor search:
//! sparse upper layers provide long-range hops, the base layer holds every
//! node for the final beam search.
//!
//! ```text
//! layer 2:  o ------------------- o          (few nodes, long hops)
//!           |                     |
//! layer 1:  o ---- o ------- o -- o          (more nodes)
//!           |      |         |    |
//! layer 0:  o -- o o -- o -- o -- o -- o     (all nodes)
//! ```

mod index;
mod node;
mod visited;

pub use index::{HnswIndex, IndexStats, VectorAccessor};
pub use node::Node;
pub use visited::VisitedSet;

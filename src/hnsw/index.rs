//! The layered-graph index.
//!
//! **Insert**: assign the node a random top layer (exponential distribution),
//! greedily descend from the entry point to just above that layer, then on
//! every layer down to the base run a beam search with `ef_construction`
//! candidates, keep the best `m` (base layer: `2m`) as neighbors, and wire
//! the edges bidirectionally. A neighbor list pushed past its cap is
//! re-ranked by distance and the farthest entries are dropped.
//!
//! **Search**: the same descent, then a beam search over the base layer with
//! `ef_search` candidates.
//!
//! **Delete**: soft. Removed ids go into a tombstone set and are filtered
//! out of results; their edges stay behind so the graph stays navigable. The
//! base-layer beam is widened by the tombstone count so buried live
//! neighbors still surface.
//!
//! All orderings break distance ties toward the lower id, which makes
//! results deterministic across runs and rebuilds.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::node::Node;
use super::visited::VisitedSet;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metric::DistanceMetric;

/// Reads the payload for a vector id and hands it to the sink, without
/// cloning. Supplied by whoever owns the vectors (the metadata store); the
/// graph itself never stores a payload.
pub type VectorAccessor = Box<dyn Fn(u64, &mut dyn FnMut(&[f32])) + Send + Sync>;

/// Identical insert sequences must rebuild identical graphs, so layer
/// assignment draws from a fixed-seed RNG by default.
const DEFAULT_SEED: u64 = 0x51_7c_c1_b7_27_22_0a_95;

/// Frontier entry (min-heap: closest pops first, ties to the lower id).
#[derive(Clone, Copy)]
struct Candidate {
    id: u64,
    distance: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.id == other.id
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result-set entry (max-heap: the worst of the kept results sits on top;
/// among equal distances the higher id is evicted first, so earlier inserts
/// win ties).
#[derive(Clone, Copy)]
struct Kept {
    id: u64,
    distance: f32,
}

impl PartialEq for Kept {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.id == other.id
    }
}

impl Eq for Kept {}

impl Ord for Kept {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Kept {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct HnswIndex {
    nodes: Vec<Node>,
    id_to_index: HashMap<u64, usize>,
    entry_point: Option<u64>,
    max_layer: usize,
    dimension: usize,
    m: usize,
    m0: usize,
    ml: f64,
    ef_construction: usize,
    ef_search: usize,
    metric: DistanceMetric,
    tombstones: HashSet<u64>,
    vectors: VectorAccessor,
    rng: StdRng,
}

impl HnswIndex {
    pub fn new(config: &StoreConfig, vectors: VectorAccessor) -> Self {
        Self::with_seed(config, vectors, DEFAULT_SEED)
    }

    pub fn with_seed(config: &StoreConfig, vectors: VectorAccessor, seed: u64) -> Self {
        Self {
            nodes: Vec::with_capacity(config.capacity),
            id_to_index: HashMap::with_capacity(config.capacity),
            entry_point: None,
            max_layer: 0,
            dimension: config.dimension,
            m: config.m,
            m0: config.m * 2,
            ml: 1.0 / (config.m as f64).ln(),
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            metric: config.metric,
            tombstones: HashSet::new(),
            vectors,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Nodes ever inserted, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that can still appear in search results.
    pub fn live_len(&self) -> usize {
        self.nodes.len() - self.tombstones.len()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.id_to_index.contains_key(&id) && !self.tombstones.contains(&id)
    }

    pub fn ef_search(&self) -> usize {
        self.ef_search
    }

    pub fn set_ef_search(&mut self, ef_search: usize) {
        self.ef_search = ef_search.max(1);
    }

    #[inline]
    fn distance(&self, query: &[f32], id: u64) -> f32 {
        let mut out = f32::INFINITY;
        (self.vectors)(id, &mut |v| out = self.metric.distance(query, v));
        out
    }

    fn fetch_vector(&self, id: u64) -> Vec<f32> {
        let mut out = Vec::new();
        (self.vectors)(id, &mut |v| out.extend_from_slice(v));
        out
    }

    fn random_layer(&mut self) -> usize {
        // 1 - U lies in (0, 1], so the log never sees zero.
        let r = 1.0 - self.rng.gen::<f64>();
        (-r.ln() * self.ml) as usize
    }

    pub fn insert(&mut self, id: u64, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        debug_assert!(!self.id_to_index.contains_key(&id), "duplicate id {id}");

        let top_layer = self.random_layer();
        let mut node = Node::new(id, top_layer);

        let Some(entry) = self.entry_point else {
            self.id_to_index.insert(id, self.nodes.len());
            self.nodes.push(node);
            self.entry_point = Some(id);
            self.max_layer = top_layer;
            return Ok(());
        };

        let mut current = entry;
        for layer in (top_layer + 1..=self.max_layer).rev() {
            if let Some(&(next, _)) = self.search_layer(vector, current, 1, layer).first() {
                current = next;
            }
        }

        // Distance evaluation reads through the accessor, so gather every
        // edge change first and apply them in one mutation pass.
        let mut reverse_edges: Vec<(usize, usize, u64)> = Vec::new();
        let mut pruned_lists: Vec<(usize, usize, Vec<u64>)> = Vec::new();

        for layer in (0..=top_layer.min(self.max_layer)).rev() {
            let cap = if layer == 0 { self.m0 } else { self.m };
            let candidates = self.search_layer(vector, current, self.ef_construction, layer);
            let chosen = best_by_distance(&candidates, cap);

            for &(neighbor_id, _) in &chosen {
                node.add_neighbor(layer, neighbor_id);
                let Some(&idx) = self.id_to_index.get(&neighbor_id) else {
                    continue;
                };
                let existing = self.nodes[idx].neighbors(layer);
                if existing.len() < cap {
                    reverse_edges.push((idx, layer, id));
                } else {
                    // Full list: re-rank current neighbors plus the new edge
                    // from this neighbor's point of view, drop the farthest.
                    let anchor = self.fetch_vector(neighbor_id);
                    let mut ranked: Vec<(u64, f32)> = existing
                        .iter()
                        .map(|&other| (other, self.distance(&anchor, other)))
                        .collect();
                    ranked.push((id, self.metric.distance(&anchor, vector)));
                    let kept = best_by_distance(&ranked, cap)
                        .into_iter()
                        .map(|(n, _)| n)
                        .collect();
                    pruned_lists.push((idx, layer, kept));
                }
            }

            if let Some(&(closest, _)) = candidates.first() {
                current = closest;
            }
        }

        for (idx, layer, neighbor) in reverse_edges {
            self.nodes[idx].add_neighbor(layer, neighbor);
        }
        for (idx, layer, kept) in pruned_lists {
            if let Some(list) = self.nodes[idx].neighbors_mut(layer) {
                list.clear();
                list.extend(kept);
            }
        }

        self.id_to_index.insert(id, self.nodes.len());
        self.nodes.push(node);
        if top_layer > self.max_layer {
            self.max_layer = top_layer;
            self.entry_point = Some(id);
        }
        Ok(())
    }

    /// Soft-delete. Returns whether the id was present and not yet removed;
    /// a repeat call is a no-op returning `false`.
    pub fn remove(&mut self, id: u64) -> bool {
        if !self.id_to_index.contains_key(&id) {
            return false;
        }
        self.tombstones.insert(id)
    }

    /// `k` nearest live ids, ascending by `(distance, id)`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut current = entry;
        for layer in (1..=self.max_layer).rev() {
            if let Some(&(next, _)) = self.search_layer(query, current, 1, layer).first() {
                current = next;
            }
        }

        let ef = self
            .ef_search
            .max(k)
            .saturating_add(self.tombstones.len());
        let hits = self.search_layer(query, current, ef, 0);
        Ok(hits
            .into_iter()
            .filter(|(id, _)| !self.tombstones.contains(id))
            .take(k)
            .collect())
    }

    /// Beam search restricted to one layer. Returns up to `ef` ids sorted
    /// ascending by `(distance, id)`.
    fn search_layer(&self, query: &[f32], entry: u64, ef: usize, layer: usize) -> Vec<(u64, f32)> {
        let mut visited = VisitedSet::acquire(self.nodes.len());
        let mut frontier: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef);
        let mut kept: BinaryHeap<Kept> = BinaryHeap::with_capacity(ef + 1);

        let entry_distance = self.distance(query, entry);
        visited.visit(entry);
        frontier.push(Candidate {
            id: entry,
            distance: entry_distance,
        });
        kept.push(Kept {
            id: entry,
            distance: entry_distance,
        });

        while let Some(current) = frontier.pop() {
            if kept.len() >= ef {
                if let Some(worst) = kept.peek() {
                    if current.distance > worst.distance {
                        break;
                    }
                }
            }

            let Some(&idx) = self.id_to_index.get(&current.id) else {
                continue;
            };
            for &neighbor in self.nodes[idx].neighbors(layer) {
                if visited.is_visited(neighbor) {
                    continue;
                }
                visited.visit(neighbor);

                let distance = self.distance(query, neighbor);
                let worst = kept.peek().map(|w| w.distance).unwrap_or(f32::INFINITY);
                if kept.len() < ef || distance < worst {
                    frontier.push(Candidate {
                        id: neighbor,
                        distance,
                    });
                    kept.push(Kept {
                        id: neighbor,
                        distance,
                    });
                    if kept.len() > ef {
                        kept.pop();
                    }
                }
            }
        }

        let mut out: Vec<(u64, f32)> = kept.into_iter().map(|r| (r.id, r.distance)).collect();
        out.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        out
    }

    pub fn stats(&self) -> IndexStats {
        let mut layer_counts = vec![0usize; self.max_layer + 1];
        let mut edges = 0;
        for node in &self.nodes {
            for (layer, neighbors) in node.layers.iter().enumerate() {
                if layer < layer_counts.len() {
                    layer_counts[layer] += 1;
                }
                edges += neighbors.len();
            }
        }

        IndexStats {
            nodes: self.nodes.len(),
            live: self.live_len(),
            tombstones: self.tombstones.len(),
            max_layer: self.max_layer,
            layer_counts,
            edges,
            m: self.m,
            ef_construction: self.ef_construction,
            ef_search: self.ef_search,
        }
    }
}

/// Up to `cap` candidates, ascending by `(distance, id)`.
fn best_by_distance(candidates: &[(u64, f32)], cap: usize) -> Vec<(u64, f32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    sorted.truncate(cap);
    sorted
}

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub nodes: usize,
    pub live: usize,
    pub tombstones: usize,
    pub max_layer: usize,
    pub layer_counts: Vec<usize>,
    pub edges: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::metric::{cosine_distance, l2_normalized};

    fn accessor_over(vectors: Arc<Vec<Vec<f32>>>) -> VectorAccessor {
        Box::new(move |id, sink| {
            if let Some(v) = vectors.get(id as usize) {
                sink(v);
            }
        })
    }

    fn index_over(vectors: &Arc<Vec<Vec<f32>>>, dimension: usize) -> HnswIndex {
        let config = StoreConfig {
            capacity: vectors.len(),
            ..StoreConfig::with_dimension(dimension)
        };
        HnswIndex::new(&config, accessor_over(Arc::clone(vectors)))
    }

    fn random_unit_vectors(count: usize, dimension: usize, seed: u64) -> Arc<Vec<Vec<f32>>> {
        let mut rng = StdRng::seed_from_u64(seed);
        Arc::new(
            (0..count)
                .map(|_| {
                    let raw: Vec<f32> = (0..dimension).map(|_| rng.gen::<f32>() - 0.5).collect();
                    l2_normalized(&raw)
                })
                .collect(),
        )
    }

    #[test]
    fn insert_single() {
        let vectors = random_unit_vectors(1, 8, 1);
        let mut index = index_over(&vectors, 8);
        index.insert(0, &vectors[0]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.live_len(), 1);
        assert!(index.contains(0));
    }

    #[test]
    fn insert_rejects_wrong_dimension() {
        let vectors = random_unit_vectors(1, 8, 1);
        let mut index = index_over(&vectors, 8);
        let err = index.insert(0, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 8,
                got: 2
            }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn exact_query_finds_itself() {
        let vectors = random_unit_vectors(100, 32, 2);
        let mut index = index_over(&vectors, 32);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }

        let results = index.search(&vectors[42], 5).unwrap();
        assert_eq!(results[0].0, 42);
        assert!(results[0].1.abs() < 1e-4);
    }

    #[test]
    fn search_empty_index() {
        let vectors = random_unit_vectors(0, 16, 3);
        let index = index_over(&vectors, 16);
        assert!(index.search(&vec![0.0; 16], 5).unwrap().is_empty());
    }

    #[test]
    fn search_k_zero() {
        let vectors = random_unit_vectors(10, 16, 4);
        let mut index = index_over(&vectors, 16);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }
        assert!(index.search(&vectors[0], 0).unwrap().is_empty());
    }

    #[test]
    fn search_k_beyond_count_returns_all() {
        let vectors = random_unit_vectors(10, 16, 5);
        let mut index = index_over(&vectors, 16);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }
        let results = index.search(&vectors[0], 100).unwrap();
        assert_eq!(results.len(), 10);
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let vectors = random_unit_vectors(5, 16, 6);
        let mut index = index_over(&vectors, 16);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }
        assert!(index.search(&[1.0, 0.0], 3).is_err());
    }

    #[test]
    fn distance_ties_go_to_earlier_id() {
        let vectors = Arc::new(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0], // same direction as id 0
        ]);
        let mut index = index_over(&vectors, 2);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }

        let results = index.search(&[0.0, 1.0], 3).unwrap();
        let ids: Vec<u64> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 2, 1]);
    }

    #[test]
    fn soft_delete_excludes_from_results() {
        let vectors = random_unit_vectors(50, 16, 7);
        let mut index = index_over(&vectors, 16);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }

        let target = index.search(&vectors[10], 1).unwrap()[0].0;
        assert!(index.remove(target));
        assert!(!index.remove(target));
        assert!(!index.contains(target));
        assert_eq!(index.live_len(), 49);

        let results = index.search(&vectors[10], 10).unwrap();
        assert!(results.iter().all(|(id, _)| *id != target));
    }

    #[test]
    fn delete_everything_empties_results() {
        let vectors = random_unit_vectors(8, 8, 8);
        let mut index = index_over(&vectors, 8);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }
        for id in 0..8 {
            assert!(index.remove(id));
        }
        assert_eq!(index.live_len(), 0);
        assert!(index.search(&vectors[0], 5).unwrap().is_empty());
    }

    #[test]
    fn recall_against_brute_force() {
        let count = 400;
        let dimension = 16;
        let k = 10;
        let vectors = random_unit_vectors(count, dimension, 9);
        let mut index = index_over(&vectors, dimension);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }
        index.set_ef_search(100);

        let mut rng = StdRng::seed_from_u64(99);
        let mut total_recall = 0.0;
        let queries = 20;
        for _ in 0..queries {
            let raw: Vec<f32> = (0..dimension).map(|_| rng.gen::<f32>() - 0.5).collect();
            let query = l2_normalized(&raw);

            let mut truth: Vec<(u64, f32)> = vectors
                .iter()
                .enumerate()
                .map(|(id, v)| (id as u64, cosine_distance(&query, v)))
                .collect();
            truth.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            let truth_ids: HashSet<u64> = truth.iter().take(k).map(|(id, _)| *id).collect();

            let found: HashSet<u64> = index
                .search(&query, k)
                .unwrap()
                .into_iter()
                .map(|(id, _)| id)
                .collect();

            total_recall += truth_ids.intersection(&found).count() as f64 / k as f64;
        }

        let recall = total_recall / queries as f64;
        assert!(recall >= 0.8, "recall@{k} too low: {recall:.2}");
    }

    #[test]
    fn stats_report_graph_shape() {
        let vectors = random_unit_vectors(100, 16, 10);
        let mut index = index_over(&vectors, 16);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id as u64, v).unwrap();
        }
        index.remove(3);

        let stats = index.stats();
        assert_eq!(stats.nodes, 100);
        assert_eq!(stats.live, 99);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.m, 16);
        assert!(stats.edges > 0);
        assert_eq!(stats.layer_counts[0], 100);
    }

    #[test]
    fn rebuild_from_same_sequence_gives_same_results() {
        let vectors = random_unit_vectors(120, 16, 11);
        let mut first = index_over(&vectors, 16);
        let mut second = index_over(&vectors, 16);
        for (id, v) in vectors.iter().enumerate() {
            first.insert(id as u64, v).unwrap();
            second.insert(id as u64, v).unwrap();
        }

        for q in 0..5 {
            let a = first.search(&vectors[q * 7], 10).unwrap();
            let b = second.search(&vectors[q * 7], 10).unwrap();
            assert_eq!(a.len(), b.len());
            for ((id_a, d_a), (id_b, d_b)) in a.iter().zip(&b) {
                assert_eq!(id_a, id_b);
                assert!((d_a - d_b).abs() < 1e-6);
            }
        }
    }
}

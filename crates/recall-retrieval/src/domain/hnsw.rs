//! Hierarchical Navigable Small World graph
//!
//! Layered proximity graph for approximate nearest-neighbor search over
//! cosine distance.
//!
//! ## Layout
//!
//! Nodes live in a dense arena (`Vec<Node>`); neighbor lists hold arena
//! slots, not pointers. Each node also keeps the set of slots that point
//! at it per layer, so removal only visits the nodes that referenced the
//! removed slot before recycling it.
//!
//! ## Algorithms
//!
//! - **Insert**: draw a top layer from a geometric distribution
//!   (`floor(-ln U * mL)`, `mL = 1/ln M`), descend greedily from the entry
//!   point, then at each layer run a beam search of width `ef_construction`
//!   and link the node to up to M neighbors chosen by the diversity
//!   heuristic.
//! - **Search**: greedy descent to layer 1, beam search of width
//!   `max(ef_search, k)` at layer 0.
//! - **Remove**: local repair. Every node that pointed at the removed node
//!   re-selects neighbors from its surviving list plus the removed node's
//!   neighbors. No global re-optimization.
//!
//! Equal distances are ordered by insertion sequence, which keeps results
//! deterministic under a fixed seed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recall_common::{RecallError, Result, ValidationError};
use tracing::{debug, trace};

use super::vector::cosine_distance;

/// Hard ceiling on the drawn level
const MAX_LEVEL: usize = 16;

#[derive(Debug, Clone, Default)]
struct Node {
    id: String,
    vector: Vec<f32>,
    level: usize,
    /// Insertion sequence, used as the tie-breaker
    seq: u64,
    /// `neighbors[layer]` for layer in 0..=level
    neighbors: Vec<Vec<usize>>,
    /// `incoming[layer]`: slots whose `neighbors[layer]` contains this node
    incoming: Vec<HashSet<usize>>,
    deleted: bool,
}

/// Search frontier entry ordered by (distance, insertion sequence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    dist: OrderedFloat<f32>,
    seq: u64,
    slot: usize,
}

/// HNSW index
#[derive(Debug, Clone)]
pub struct HnswGraph {
    dimension: usize,
    m: usize,
    m_max0: usize,
    ef_construction: usize,
    ef_search: usize,
    level_mult: f64,
    nodes: Vec<Node>,
    free_slots: Vec<usize>,
    slots: HashMap<String, usize>,
    entry_point: Option<usize>,
    next_seq: u64,
    rng: StdRng,
}

impl HnswGraph {
    /// Create a graph
    ///
    /// `m` bounds neighbors per upper layer (layer 0 keeps up to `2m`);
    /// `ef_construction` is the insertion beam width.
    pub fn new(dimension: usize, m: usize, ef_construction: usize, seed: u64) -> Result<Self> {
        if dimension == 0 {
            return Err(ValidationError::InvalidParameter(
                "HNSW dimension must be positive".to_string(),
            )
            .into());
        }
        if m < 2 {
            return Err(ValidationError::InvalidParameter(format!(
                "HNSW M must be at least 2, got {}",
                m
            ))
            .into());
        }

        let ef_construction = ef_construction.max(m);
        Ok(Self {
            dimension,
            m,
            m_max0: m * 2,
            ef_construction,
            ef_search: ef_construction,
            level_mult: 1.0 / (m as f64).ln(),
            nodes: Vec::new(),
            free_slots: Vec::new(),
            slots: HashMap::new(),
            entry_point: None,
            next_seq: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Set the layer-0 beam width used by searches
    pub fn set_ef_search(&mut self, ef_search: usize) {
        self.ef_search = ef_search.max(1);
    }

    pub fn ef_search(&self) -> usize {
        self.ef_search
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Top layer of the graph (0 when empty)
    pub fn max_level(&self) -> usize {
        self.entry_point.map(|ep| self.nodes[ep].level).unwrap_or(0)
    }

    /// Insert a vector
    pub fn add(&mut self, id: &str, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        if self.slots.contains_key(id) {
            return Err(ValidationError::DuplicateId(id.to_string()).into());
        }

        let level = self.random_level();
        let seq = self.next_seq;
        self.next_seq += 1;

        let slot = self.allocate(Node {
            id: id.to_string(),
            vector: vector.to_vec(),
            level,
            seq,
            neighbors: vec![Vec::new(); level + 1],
            incoming: vec![HashSet::new(); level + 1],
            deleted: false,
        });
        self.slots.insert(id.to_string(), slot);

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(slot);
            trace!(id = %id, level, "HNSW entry point initialized");
            return Ok(());
        };

        let top = self.nodes[entry].level;
        let mut nearest = self.candidate(entry, vector);

        // Greedy descent through the layers above the new node
        for layer in (level + 1..=top).rev() {
            nearest = self
                .search_layer(vector, &[nearest], 1, layer)
                .into_iter()
                .next()
                .unwrap_or(nearest);
        }

        let mut entries = vec![nearest];
        for layer in (0..=level.min(top)).rev() {
            let found = self.search_layer(vector, &entries, self.ef_construction, layer);
            let selected = self.select_neighbors(&found, self.m);

            self.set_neighbors(slot, layer, selected.clone());
            for neighbor in selected {
                self.link(neighbor, slot, layer);
            }
            entries = found;
        }

        if level > top {
            self.entry_point = Some(slot);
        }

        trace!(id = %id, level, "HNSW node inserted");
        Ok(())
    }

    /// The `k` nearest IDs, ascending by distance
    pub fn search_ids(&self, query: &[f32], k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(query, k)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// The `k` nearest IDs with their cosine distances, ascending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        self.check_dimension(query)?;

        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut nearest = self.candidate(entry, query);
        for layer in (1..=self.nodes[entry].level).rev() {
            nearest = self
                .search_layer(query, &[nearest], 1, layer)
                .into_iter()
                .next()
                .unwrap_or(nearest);
        }

        let found = self.search_layer(query, &[nearest], self.ef_search.max(k), 0);
        Ok(found
            .into_iter()
            .take(k)
            .map(|c| (self.nodes[c.slot].id.clone(), c.dist.into_inner()))
            .collect())
    }

    /// Remove a node and repair its neighborhood; returns whether it existed
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };

        let removed = std::mem::take(&mut self.nodes[slot]);
        self.nodes[slot].deleted = true;
        self.free_slots.push(slot);

        for layer in 0..=removed.level {
            let orphan_pool = &removed.neighbors[layer];
            for &target in orphan_pool {
                if let Some(incoming) = self.nodes[target].incoming.get_mut(layer) {
                    incoming.remove(&slot);
                }
            }

            let mut referencing: Vec<usize> = removed.incoming[layer].iter().copied().collect();
            referencing.sort_unstable();
            for node in referencing {
                self.nodes[node].neighbors[layer].retain(|&n| n != slot);
                self.repair(node, layer, orphan_pool);
            }
        }

        if self.entry_point == Some(slot) {
            self.entry_point = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| !n.deleted)
                .max_by_key(|(_, n)| (n.level, Reverse(n.seq)))
                .map(|(s, _)| s);
        }

        debug!(id = %id, level = removed.level, remaining = self.len(), "HNSW node removed");
        true
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_slots.clear();
        self.slots.clear();
        self.entry_point = None;
    }

    /// Beam search restricted to one layer; returns candidates ascending
    fn search_layer(
        &self,
        query: &[f32],
        entries: &[Candidate],
        ef: usize,
        layer: usize,
    ) -> Vec<Candidate> {
        let mut visited: HashSet<usize> = entries.iter().map(|c| c.slot).collect();
        let mut frontier: BinaryHeap<Reverse<Candidate>> =
            entries.iter().copied().map(Reverse).collect();
        let mut results: BinaryHeap<Candidate> = entries.iter().copied().collect();
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = frontier.pop() {
            if let Some(worst) = results.peek() {
                if results.len() >= ef && current > *worst {
                    break;
                }
            }

            let Some(neighbors) = self.nodes[current.slot].neighbors.get(layer) else {
                continue;
            };

            for &neighbor in neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = self.candidate(neighbor, query);
                let admit = results.len() < ef
                    || results.peek().is_some_and(|worst| candidate < *worst);
                if admit {
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Diversity heuristic over candidates sorted ascending by distance
    ///
    /// A candidate is kept when it is closer to the base than to every
    /// neighbor already kept. Pruned candidates back-fill remaining room.
    fn select_neighbors(&self, candidates: &[Candidate], cap: usize) -> Vec<usize> {
        let mut selected: Vec<Candidate> = Vec::with_capacity(cap);
        let mut pruned: Vec<Candidate> = Vec::new();

        for &candidate in candidates {
            if selected.len() >= cap {
                break;
            }
            let vector = &self.nodes[candidate.slot].vector;
            let diverse = selected.iter().all(|kept| {
                OrderedFloat(cosine_distance(vector, &self.nodes[kept.slot].vector))
                    > candidate.dist
            });
            if diverse {
                selected.push(candidate);
            } else {
                pruned.push(candidate);
            }
        }

        for candidate in pruned {
            if selected.len() >= cap {
                break;
            }
            selected.push(candidate);
        }

        selected.into_iter().map(|c| c.slot).collect()
    }

    /// Replace `slot`'s list at `layer`, keeping reverse edges in step
    fn set_neighbors(&mut self, slot: usize, layer: usize, list: Vec<usize>) {
        let old = std::mem::replace(&mut self.nodes[slot].neighbors[layer], list);
        for target in old {
            if let Some(incoming) = self.nodes[target].incoming.get_mut(layer) {
                incoming.remove(&slot);
            }
        }
        for i in 0..self.nodes[slot].neighbors[layer].len() {
            let target = self.nodes[slot].neighbors[layer][i];
            if let Some(incoming) = self.nodes[target].incoming.get_mut(layer) {
                incoming.insert(slot);
            }
        }
    }

    /// Add the edge `from -> to`, shrinking `from`'s list if it overflows
    fn link(&mut self, from: usize, to: usize, layer: usize) {
        let cap = self.max_neighbors(layer);
        if self.nodes[from].neighbors[layer].contains(&to) {
            return;
        }

        let mut list = self.nodes[from].neighbors[layer].clone();
        list.push(to);
        if list.len() > cap {
            let base = &self.nodes[from].vector;
            let mut candidates: Vec<Candidate> =
                list.iter().map(|&s| self.candidate(s, base)).collect();
            candidates.sort();
            list = self.select_neighbors(&candidates, cap);
        }
        self.set_neighbors(from, layer, list);
    }

    /// Re-select `node`'s neighbors at `layer` after losing an edge
    fn repair(&mut self, node: usize, layer: usize, orphan_pool: &[usize]) {
        let cap = self.max_neighbors(layer);
        let repaired = {
            let base = &self.nodes[node].vector;
            let mut pool: Vec<usize> = self.nodes[node].neighbors[layer].clone();
            for &s in orphan_pool {
                if s != node && !pool.contains(&s) {
                    pool.push(s);
                }
            }

            let mut candidates: Vec<Candidate> = pool
                .into_iter()
                .filter(|&s| {
                    let n = &self.nodes[s];
                    !n.deleted && n.level >= layer
                })
                .map(|s| self.candidate(s, base))
                .collect();
            candidates.sort();
            self.select_neighbors(&candidates, cap)
        };
        self.set_neighbors(node, layer, repaired);
    }

    fn candidate(&self, slot: usize, query: &[f32]) -> Candidate {
        let node = &self.nodes[slot];
        Candidate {
            dist: OrderedFloat(cosine_distance(&node.vector, query)),
            seq: node.seq,
            slot,
        }
    }

    fn max_neighbors(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    fn random_level(&mut self) -> usize {
        let u: f64 = 1.0 - self.rng.gen::<f64>();
        ((-u.ln() * self.level_mult).floor() as usize).min(MAX_LEVEL)
    }

    fn allocate(&mut self, node: Node) -> usize {
        match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RecallError::dimension_mismatch(self.dimension, vector.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, StandardNormal};

    fn random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                (0..dimension)
                    .map(|_| -> f32 { StandardNormal.sample(&mut rng) })
                    .collect()
            })
            .collect()
    }

    /// Every forward edge has a matching reverse edge and vice versa
    fn assert_reverse_edges_consistent(graph: &HnswGraph) {
        for (slot, node) in graph.nodes.iter().enumerate() {
            if node.deleted {
                assert!(node.neighbors.is_empty() && node.incoming.is_empty());
                continue;
            }
            for layer in 0..=node.level {
                for &target in &node.neighbors[layer] {
                    assert!(!graph.nodes[target].deleted, "edge to freed slot {}", target);
                    assert!(graph.nodes[target].incoming[layer].contains(&slot));
                }
                for &source in &node.incoming[layer] {
                    assert!(graph.nodes[source].neighbors[layer].contains(&slot));
                }
            }
        }
    }

    fn build(count: usize) -> (HnswGraph, Vec<Vec<f32>>) {
        let vectors = random_vectors(count, 16, 11);
        let mut graph = HnswGraph::new(16, 8, 64, 42).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            graph.add(&format!("v{}", i), v).unwrap();
        }
        (graph, vectors)
    }

    #[test]
    fn test_empty_graph_search() {
        let graph = HnswGraph::new(4, 4, 16, 1).unwrap();
        assert!(graph.search_ids(&[1.0, 0.0, 0.0, 0.0], 3).unwrap().is_empty());
        assert_eq!(graph.max_level(), 0);
    }

    #[test]
    fn test_single_node() {
        let mut graph = HnswGraph::new(3, 4, 16, 1).unwrap();
        graph.add("only", &[0.1, 0.2, 0.3]).unwrap();
        assert_eq!(graph.search_ids(&[0.1, 0.2, 0.3], 5).unwrap(), vec!["only"]);
    }

    #[test]
    fn test_recall_of_inserted_vectors() {
        let (graph, vectors) = build(300);

        let found = vectors
            .iter()
            .enumerate()
            .filter(|(i, v)| {
                graph
                    .search_ids(v, 5)
                    .unwrap()
                    .contains(&format!("v{}", i))
            })
            .count();

        let recall = found as f64 / vectors.len() as f64;
        assert!(recall >= 0.95, "recall {}", recall);
    }

    #[test]
    fn test_results_ascending() {
        let (graph, vectors) = build(100);
        let results = graph.search(&vectors[3], 10).unwrap();

        assert_eq!(results.len(), 10);
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let mut graph = HnswGraph::new(2, 4, 16, 3).unwrap();
        graph.add("first", &[1.0, 0.0]).unwrap();
        graph.add("second", &[2.0, 0.0]).unwrap();
        graph.add("third", &[0.0, 1.0]).unwrap();

        // "first" and "second" are both at cosine distance 0
        let ids = graph.search_ids(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut graph = HnswGraph::new(2, 4, 16, 3).unwrap();
        graph.add("a", &[1.0, 0.0]).unwrap();
        let err = graph.add("a", &[0.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            RecallError::Validation(ValidationError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_dimension_enforced() {
        let mut graph = HnswGraph::new(4, 4, 16, 3).unwrap();
        assert!(graph.add("a", &[1.0]).is_err());
        assert!(graph.search(&[1.0, 2.0], 1).is_err());
    }

    #[test]
    fn test_remove_repairs_graph() {
        let (mut graph, vectors) = build(200);

        for i in (0..200).step_by(2) {
            assert!(graph.remove(&format!("v{}", i)));
        }
        assert_eq!(graph.len(), 100);
        assert!(!graph.remove("v0"));

        let mut found = 0;
        for (i, v) in vectors.iter().enumerate() {
            let ids = graph.search_ids(v, 5).unwrap();
            if i % 2 == 0 {
                assert!(!ids.contains(&format!("v{}", i)));
            } else if ids.contains(&format!("v{}", i)) {
                found += 1;
            }
        }

        let recall = found as f64 / 100.0;
        assert!(recall >= 0.9, "recall after removal {}", recall);
    }

    #[test]
    fn test_remove_everything_then_reuse_slots() {
        let mut graph = HnswGraph::new(2, 4, 16, 5).unwrap();
        graph.add("a", &[1.0, 0.0]).unwrap();
        graph.add("b", &[0.0, 1.0]).unwrap();

        assert!(graph.remove("a"));
        assert!(graph.remove("b"));
        assert!(graph.is_empty());
        assert!(graph.search_ids(&[1.0, 0.0], 1).unwrap().is_empty());

        graph.add("c", &[1.0, 1.0]).unwrap();
        assert_eq!(graph.search_ids(&[1.0, 1.0], 1).unwrap(), vec!["c"]);
    }

    #[test]
    fn test_reverse_edges_track_inserts_and_removals() {
        let (mut graph, vectors) = build(150);
        assert_reverse_edges_consistent(&graph);

        for i in (0..150).step_by(3) {
            assert!(graph.remove(&format!("v{}", i)));
        }
        assert_reverse_edges_consistent(&graph);

        // freed slots are reused by new inserts
        for (i, v) in vectors.iter().enumerate().take(20) {
            graph.add(&format!("again{}", i), v).unwrap();
        }
        assert_reverse_edges_consistent(&graph);
        assert_eq!(graph.len(), 150 - 50 + 20);
    }

    #[test]
    fn test_search_with_huge_k() {
        let (graph, vectors) = build(30);
        let results = graph.search(&vectors[0], usize::MAX).unwrap();
        assert_eq!(results.len(), 30);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(HnswGraph::new(0, 8, 16, 1).is_err());
        assert!(HnswGraph::new(4, 1, 16, 1).is_err());
    }
}

//! # HNSW Vector Index
//!
//! Hierarchical navigable small-world graph for approximate nearest
//! neighbor search. Nodes live in a single arena and reference each other
//! by integer id; the layer edges are navigation edges, not ownership, so
//! the graph stays cycle-safe under Rust ownership.
//!
//! ```text
//! Level 2:     [A]-------------[B]           (few nodes, long edges)
//!               |               |
//! Level 1:     [A]----[C]------[B]----[D]
//!               |      |        |      |
//! Level 0:     [A]-[E]-[C]-[F]-[B]-[G]-[D]   (all nodes)
//! ```
//!
//! ## Parameters
//!
//! - `m`: neighbors per node above level 0; level 0 allows `m0 = 2 * m`
//! - `ef_construction`: beam width while inserting
//! - `ef_search`: beam width while querying (raised to `k` when `k` is larger)
//!
//! ## Insertion
//!
//! 1. Draw the node's level from the exponential distribution
//!    `floor(−ln(uniform) · ml)` with `ml = 1 / ln(m)`
//! 2. Greedy-descend from the entry point down to the node's level
//! 3. Per level, beam-search `ef_construction` candidates, connect to
//!    neighbors chosen by the diversity heuristic (prefer candidates that
//!    are not already covered by a closer selected neighbor), then prune
//!    any neighbor list that grew past its cap
//! 4. A node whose level exceeds the current maximum becomes the entry
//!
//! ## Deletion
//!
//! Soft: the node is tombstoned, keeps serving as a stepping stone during
//! traversal, and is filtered out of results.

use super::XorShift;
use crate::storage::Rid;
use crate::vector::{self, VectorMetric};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

type NodeId = usize;

const MAX_LEVEL: u8 = 15;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: NodeId,
    distance: f64,
}

impl Candidate {
    fn new(node: NodeId, distance: f64) -> Candidate {
        Candidate { node, distance }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap ordering: the closest candidate pops first.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// Max-heap wrapper: the farthest result pops first, which makes the
/// result heap a bounded best-`ef` set.
#[derive(Debug, Clone, Copy)]
struct FarthestFirst(Candidate);

impl PartialEq for FarthestFirst {
    fn eq(&self, other: &Self) -> bool {
        self.0.distance == other.0.distance
    }
}

impl Eq for FarthestFirst {}

impl PartialOrd for FarthestFirst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FarthestFirst {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .distance
            .partial_cmp(&other.0.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// Generation-stamped visited marks, reused across the per-level searches
/// of one operation without clearing.
struct VisitedSet {
    generation: u64,
    marks: Vec<u64>,
}

impl VisitedSet {
    fn new(capacity: usize) -> VisitedSet {
        VisitedSet {
            generation: 1,
            marks: vec![0; capacity],
        }
    }

    fn next_generation(&mut self) {
        self.generation += 1;
    }

    /// Marks a node, reporting whether it was unvisited.
    fn insert(&mut self, node: NodeId) -> bool {
        if self.marks[node] == self.generation {
            false
        } else {
            self.marks[node] = self.generation;
            true
        }
    }
}

#[derive(Debug)]
struct HnswNode {
    vector: Vec<f64>,
    rid: Rid,
    level: u8,
    /// Adjacency per level, `neighbors[0]` is the base layer.
    neighbors: Vec<Vec<NodeId>>,
    deleted: bool,
}

#[derive(Debug)]
struct HnswState {
    nodes: Vec<HnswNode>,
    entry: Option<NodeId>,
    max_level: u8,
    rng: XorShift,
}


#[derive(Debug)]
pub struct HnswIndex {
    metric: VectorMetric,
    m: usize,
    m0: usize,
    ef_construction: usize,
    ef_search: usize,
    ml: f64,
    state: RwLock<HnswState>,
}

impl HnswIndex {
    pub fn new(
        metric: VectorMetric,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
    ) -> HnswIndex {
        let m = m.max(1);
        HnswIndex {
            metric,
            m,
            m0: m * 2,
            ef_construction: ef_construction.max(1),
            ef_search: ef_search.max(1),
            ml: calculate_ml(m),
            state: RwLock::new(HnswState {
                nodes: Vec::new(),
                entry: None,
                max_level: 0,
                rng: XorShift::new(0x9E37),
            }),
        }
    }

    pub fn metric(&self) -> VectorMetric {
        self.metric
    }

    /// Rebuilds the graph from scratch by inserting every point.
    pub fn build(&self, points: &[(Vec<f64>, Rid)]) {
        {
            let mut state = self.state.write();
            state.nodes.clear();
            state.entry = None;
            state.max_level = 0;
        }
        for (vector, rid) in points {
            self.insert(vector, *rid);
        }
    }

    pub fn insert(&self, vector: &[f64], rid: Rid) -> bool {
        let mut state = self.state.write();
        if state
            .nodes
            .iter()
            .any(|n| !n.deleted && n.rid == rid)
        {
            return false;
        }

        let sample = state.rng.next_f64();
        let level = select_level(sample, self.ml);

        let id = state.nodes.len();
        state.nodes.push(HnswNode {
            vector: vector.to_vec(),
            rid,
            level,
            neighbors: vec![Vec::new(); level as usize + 1],
            deleted: false,
        });

        let Some(entry) = state.entry else {
            state.entry = Some(id);
            state.max_level = level;
            return true;
        };

        let max_level = state.max_level;
        let mut visited = VisitedSet::new(state.nodes.len());
        let mut current = Candidate::new(
            entry,
            self.node_distance(&state.nodes, entry, vector),
        );

        // Greedy descent through the layers above the new node.
        let mut lev = max_level;
        while lev > level {
            current = self.greedy_step_to_minimum(&state.nodes, vector, current, lev);
            lev -= 1;
        }

        // Beam-search-and-connect from the node's level down to the base.
        for lev in (0..=level.min(max_level)).rev() {
            let found = self.search_layer(
                &state.nodes,
                vector,
                current,
                lev,
                self.ef_construction,
                &mut visited,
            );

            let cap = self.max_neighbors(lev);
            let selected = self.select_neighbors_heuristic(&state.nodes, &found, cap);

            for &neighbor in &selected {
                state.nodes[id].neighbors[lev as usize].push(neighbor);
                state.nodes[neighbor].neighbors[lev as usize].push(id);
                self.prune_neighbors(&mut state.nodes, neighbor, lev);
            }

            if let Some(best) = found.first() {
                current = *best;
            }
        }

        if level > max_level {
            state.entry = Some(id);
            state.max_level = level;
        }
        true
    }

    /// Tombstones the node owning `rid`; graph edges stay in place.
    pub fn delete(&self, rid: Rid) {
        let mut state = self.state.write();
        for node in state.nodes.iter_mut() {
            if node.rid == rid {
                node.deleted = true;
            }
        }
    }

    /// Top-k RIDs by the configured metric, best first.
    pub fn scan_vector(&self, query: &[f64], k: usize) -> Vec<Rid> {
        if k == 0 {
            return Vec::new();
        }
        let state = self.state.read();
        let Some(entry) = state.entry else {
            return Vec::new();
        };

        let mut current = Candidate::new(
            entry,
            self.node_distance(&state.nodes, entry, query),
        );
        let mut lev = state.max_level;
        while lev > 0 {
            current = self.greedy_step_to_minimum(&state.nodes, query, current, lev);
            lev -= 1;
        }

        let ef = self.ef_search.max(k);
        let mut visited = VisitedSet::new(state.nodes.len());
        let found = self.search_layer(&state.nodes, query, current, 0, ef, &mut visited);

        found
            .into_iter()
            .filter(|c| !state.nodes[c.node].deleted)
            .take(k)
            .map(|c| state.nodes[c.node].rid)
            .collect()
    }

    fn max_neighbors(&self, level: u8) -> usize {
        if level == 0 {
            self.m0
        } else {
            self.m
        }
    }

    fn node_distance(&self, nodes: &[HnswNode], node: NodeId, query: &[f64]) -> f64 {
        vector::distance(query, &nodes[node].vector, self.metric)
    }

    /// Greedy walk on one level until no neighbor improves the distance.
    fn greedy_step_to_minimum(
        &self,
        nodes: &[HnswNode],
        query: &[f64],
        start: Candidate,
        level: u8,
    ) -> Candidate {
        let mut best = start;
        loop {
            let mut improved = false;
            for &neighbor in neighbors_at(nodes, best.node, level) {
                let d = self.node_distance(nodes, neighbor, query);
                if d < best.distance {
                    best = Candidate::new(neighbor, d);
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Beam search on one level: explores from `entry`, keeps the best `ef`
    /// results, stops once the nearest open candidate is worse than the
    /// worst kept result. Returns results sorted best-first. Tombstoned
    /// nodes participate fully; the caller filters them from final output.
    fn search_layer(
        &self,
        nodes: &[HnswNode],
        query: &[f64],
        entry: Candidate,
        level: u8,
        ef: usize,
        visited: &mut VisitedSet,
    ) -> Vec<Candidate> {
        visited.next_generation();
        visited.insert(entry.node);

        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut results: BinaryHeap<FarthestFirst> = BinaryHeap::new();
        candidates.push(entry);
        results.push(FarthestFirst(entry));

        while let Some(current) = candidates.pop() {
            let worst = results
                .peek()
                .map(|c| c.0.distance)
                .unwrap_or(f64::INFINITY);
            if current.distance > worst && results.len() >= ef {
                break;
            }

            for &neighbor in neighbors_at(nodes, current.node, level) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = self.node_distance(nodes, neighbor, query);
                let worst = results
                    .peek()
                    .map(|c| c.0.distance)
                    .unwrap_or(f64::INFINITY);
                if d < worst || results.len() < ef {
                    candidates.push(Candidate::new(neighbor, d));
                    results.push(FarthestFirst(Candidate::new(neighbor, d)));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut sorted: Vec<Candidate> = results.into_iter().map(|c| c.0).collect();
        sorted.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
        });
        sorted
    }

    /// Diversity-preferring neighbor selection: a candidate is skipped when
    /// it sits closer to an already-selected neighbor than to the query,
    /// since the selected one already covers that direction. Left-over
    /// slots are backfilled by plain distance.
    fn select_neighbors_heuristic(
        &self,
        nodes: &[HnswNode],
        candidates: &[Candidate],
        cap: usize,
    ) -> Vec<NodeId> {
        let mut selected: Vec<NodeId> = Vec::with_capacity(cap);

        for candidate in candidates {
            if selected.len() >= cap {
                break;
            }
            let covered = selected.iter().any(|&s| {
                vector::distance(&nodes[candidate.node].vector, &nodes[s].vector, self.metric)
                    < candidate.distance
            });
            if !covered {
                selected.push(candidate.node);
            }
        }

        if selected.len() < cap {
            for candidate in candidates {
                if selected.len() >= cap {
                    break;
                }
                if !selected.contains(&candidate.node) {
                    selected.push(candidate.node);
                }
            }
        }

        selected
    }

    /// Caps a node's neighbor list at its level maximum, keeping the
    /// closest edges.
    fn prune_neighbors(&self, nodes: &mut [HnswNode], node: NodeId, level: u8) {
        let cap = self.max_neighbors(level);
        if nodes[node].neighbors[level as usize].len() <= cap {
            return;
        }
        let anchor = nodes[node].vector.clone();
        let mut with_distance: Vec<(f64, NodeId)> = nodes[node].neighbors[level as usize]
            .iter()
            .map(|&n| (vector::distance(&anchor, &nodes[n].vector, self.metric), n))
            .collect();
        with_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        with_distance.truncate(cap);
        nodes[node].neighbors[level as usize] =
            with_distance.into_iter().map(|(_, n)| n).collect();
    }
}

fn neighbors_at(nodes: &[HnswNode], node: NodeId, level: u8) -> &[NodeId] {
    nodes[node]
        .neighbors
        .get(level as usize)
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

/// Exponential level selection: `floor(−ln(u) · ml)`, capped. About 63% of
/// nodes stay at level 0 for `m = 16`.
fn select_level(uniform_sample: f64, ml: f64) -> u8 {
    let level = (-uniform_sample.max(f64::MIN_POSITIVE).ln() * ml).floor();
    (level as u8).min(MAX_LEVEL)
}

fn calculate_ml(m: usize) -> f64 {
    if m <= 1 {
        0.0
    } else {
        1.0 / (m as f64).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u16) -> Rid {
        Rid::new(0, n)
    }

    fn line_points(n: usize) -> Vec<(Vec<f64>, Rid)> {
        (0..n).map(|i| (vec![i as f64, 0.0], rid(i as u16))).collect()
    }

    #[test]
    fn level_selection_follows_the_distribution() {
        let ml = calculate_ml(16);
        assert_eq!(select_level(0.99, ml), 0);
        assert!(select_level(0.0001, ml) > 0);
        // Degenerate sample saturates at the cap instead of overflowing.
        assert!(select_level(0.0, ml) <= MAX_LEVEL);
    }

    #[test]
    fn ml_for_m_one_pins_every_node_to_level_zero() {
        let ml = calculate_ml(1);
        assert_eq!(select_level(0.5, ml), 0);
        assert_eq!(select_level(0.0001, ml), 0);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = HnswIndex::new(VectorMetric::L2, 16, 100, 32);
        assert!(index.scan_vector(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn single_point_is_found() {
        let index = HnswIndex::new(VectorMetric::L2, 16, 100, 32);
        index.insert(&[3.0, 4.0], rid(7));
        assert_eq!(index.scan_vector(&[0.0, 0.0], 1), vec![rid(7)]);
    }

    #[test]
    fn knn_on_a_line_is_exact() {
        let index = HnswIndex::new(VectorMetric::L2, 8, 64, 32);
        index.build(&line_points(50));

        let hits = index.scan_vector(&[10.2, 0.0], 3);
        assert_eq!(hits, vec![rid(10), rid(11), rid(9)]);
    }

    #[test]
    fn full_k_returns_a_permutation_of_all_points() {
        let points = line_points(40);
        let index = HnswIndex::new(VectorMetric::L2, 8, 64, 16);
        index.build(&points);

        let mut hits = index.scan_vector(&[0.0, 0.0], points.len());
        assert_eq!(hits.len(), points.len());
        hits.sort_by_key(|r| r.slot);
        let mut expected: Vec<Rid> = points.iter().map(|(_, r)| *r).collect();
        expected.sort_by_key(|r| r.slot);
        assert_eq!(hits, expected);
    }

    #[test]
    fn minimal_parameters_still_answer() {
        // M = 1, ef_search = 1 is the degenerate configuration.
        let index = HnswIndex::new(VectorMetric::L2, 1, 1, 1);
        index.build(&line_points(10));

        let hits = index.scan_vector(&[4.1, 0.0], 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn k_zero_returns_nothing() {
        let index = HnswIndex::new(VectorMetric::L2, 8, 64, 16);
        index.build(&line_points(10));
        assert!(index.scan_vector(&[0.0, 0.0], 0).is_empty());
    }

    #[test]
    fn deleted_nodes_vanish_from_results_but_not_traversal() {
        let index = HnswIndex::new(VectorMetric::L2, 8, 64, 32);
        index.build(&line_points(20));

        index.delete(rid(5));
        let hits = index.scan_vector(&[5.0, 0.0], 3);
        assert!(!hits.contains(&rid(5)));
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn duplicate_rid_insert_is_swallowed() {
        let index = HnswIndex::new(VectorMetric::L2, 8, 64, 32);
        assert!(index.insert(&[1.0], rid(1)));
        assert!(!index.insert(&[1.0], rid(1)));
    }

    #[test]
    fn cosine_metric_ranks_by_angle() {
        let index = HnswIndex::new(VectorMetric::Cosine, 8, 64, 32);
        index.insert(&[1.0, 0.0], rid(0));
        index.insert(&[0.7, 0.7], rid(1));
        index.insert(&[0.0, 1.0], rid(2));

        let hits = index.scan_vector(&[1.0, 0.1], 3);
        assert_eq!(hits[0], rid(0));
        assert_eq!(hits[2], rid(2));
    }
}

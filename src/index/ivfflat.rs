//! # IVFFlat Vector Index
//!
//! Inverted-file flat index: at build time the points are partitioned into
//! `lists` buckets by nearest centroid (k-means); at query time the
//! `probe_lists` centroids closest to the query are selected and their
//! buckets flat-scanned, keeping a bounded heap of the `k` best candidates.
//!
//! ## Build
//!
//! 1. Sample `lists` distinct points as initial centroids
//! 2. Assign every point to its nearest centroid
//! 3. Recompute centroids as bucket means; reseed emptied clusters
//! 4. Repeat until assignments stabilize (capped rounds)
//!
//! Centroid distance always uses L2 regardless of the query metric; the
//! partitioning is a coarse quantizer, not a ranking.
//!
//! ## Incremental Maintenance
//!
//! Inserts after build drop the point into its nearest bucket (growing the
//! centroid set until `lists` exist, so an index created on an empty table
//! still works). Deletes scan the buckets by RID; buckets are small by
//! construction.

use super::XorShift;
use crate::storage::Rid;
use crate::vector::{self, VectorMetric};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const KMEANS_ROUNDS: usize = 10;

#[derive(Debug)]
struct IvfState {
    centroids: Vec<Vec<f64>>,
    buckets: Vec<Vec<(Vec<f64>, Rid)>>,
    rng: XorShift,
}


#[derive(Debug)]
pub struct IvfFlatIndex {
    metric: VectorMetric,
    lists: usize,
    probe_lists: usize,
    state: RwLock<IvfState>,
}

/// Max-heap entry so the bounded heap evicts the worst candidate first.
struct FarthestFirst {
    distance: f64,
    rid: Rid,
}

impl PartialEq for FarthestFirst {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
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
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
    }
}

impl IvfFlatIndex {
    pub fn new(metric: VectorMetric, lists: usize, probe_lists: usize) -> IvfFlatIndex {
        IvfFlatIndex {
            metric,
            lists: lists.max(1),
            probe_lists: probe_lists.max(1),
            state: RwLock::new(IvfState {
                centroids: Vec::new(),
                buckets: Vec::new(),
                rng: XorShift::new(0x1517),
            }),
        }
    }

    pub fn metric(&self) -> VectorMetric {
        self.metric
    }

    /// Replaces the index contents with a fresh k-means partitioning.
    pub fn build(&self, points: &[(Vec<f64>, Rid)]) {
        let mut state = self.state.write();
        state.centroids.clear();
        state.buckets.clear();
        if points.is_empty() {
            return;
        }

        let k = self.lists.min(points.len());

        // Sample k distinct starting points.
        let mut chosen: Vec<usize> = Vec::with_capacity(k);
        while chosen.len() < k {
            let candidate = state.rng.below(points.len());
            if !chosen.contains(&candidate) {
                chosen.push(candidate);
            }
        }
        state.centroids = chosen.iter().map(|&i| points[i].0.clone()).collect();

        let mut assignment = vec![0usize; points.len()];
        for _ in 0..KMEANS_ROUNDS {
            let mut changed = false;
            for (p, (vec, _)) in points.iter().enumerate() {
                let nearest = nearest_centroid(&state.centroids, vec);
                if assignment[p] != nearest {
                    assignment[p] = nearest;
                    changed = true;
                }
            }

            // Recompute means; reseed clusters that lost every member.
            let dim = points[0].0.len();
            let mut sums = vec![vec![0.0; dim]; k];
            let mut counts = vec![0usize; k];
            for (p, (vec, _)) in points.iter().enumerate() {
                counts[assignment[p]] += 1;
                for (s, x) in sums[assignment[p]].iter_mut().zip(vec) {
                    *s += x;
                }
            }
            for c in 0..k {
                if counts[c] == 0 {
                    let reseed = state.rng.below(points.len());
                    state.centroids[c] = points[reseed].0.clone();
                } else {
                    for s in sums[c].iter_mut() {
                        *s /= counts[c] as f64;
                    }
                    state.centroids[c] = std::mem::take(&mut sums[c]);
                }
            }

            if !changed {
                break;
            }
        }

        state.buckets = vec![Vec::new(); k];
        for (p, (vec, rid)) in points.iter().enumerate() {
            // Final assignment against the settled centroids.
            let nearest = nearest_centroid(&state.centroids, vec);
            assignment[p] = nearest;
            state.buckets[nearest].push((vec.clone(), *rid));
        }
    }

    /// Drops the point into its nearest bucket, growing the centroid set
    /// while fewer than `lists` exist.
    pub fn insert(&self, vector: &[f64], rid: Rid) -> bool {
        let mut state = self.state.write();
        if state
            .buckets
            .iter()
            .flatten()
            .any(|(v, r)| *r == rid && v == vector)
        {
            return false;
        }
        if state.centroids.len() < self.lists {
            state.centroids.push(vector.to_vec());
            state.buckets.push(vec![(vector.to_vec(), rid)]);
            return true;
        }
        let nearest = nearest_centroid(&state.centroids, vector);
        state.buckets[nearest].push((vector.to_vec(), rid));
        true
    }

    pub fn delete(&self, rid: Rid) {
        let mut state = self.state.write();
        for bucket in state.buckets.iter_mut() {
            bucket.retain(|(_, r)| *r != rid);
        }
    }

    /// Top-k RIDs by the configured metric, best first.
    pub fn scan_vector(&self, query: &[f64], k: usize) -> Vec<Rid> {
        if k == 0 {
            return Vec::new();
        }
        let state = self.state.read();
        if state.centroids.is_empty() {
            return Vec::new();
        }

        // Rank centroids by closeness to the query, probe the best few.
        let mut ranked: Vec<(f64, usize)> = state
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (vector::raw_distance(query, c, VectorMetric::L2), i))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        ranked.truncate(self.probe_lists);

        let mut heap: BinaryHeap<FarthestFirst> = BinaryHeap::with_capacity(k + 1);
        for (_, centroid_idx) in ranked {
            for (vec, rid) in &state.buckets[centroid_idx] {
                let distance = vector::distance(query, vec, self.metric);
                heap.push(FarthestFirst {
                    distance,
                    rid: *rid,
                });
                if heap.len() > k {
                    heap.pop();
                }
            }
        }

        let mut best: Vec<FarthestFirst> = heap.into_vec();
        best.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        best.into_iter().map(|c| c.rid).collect()
    }
}

fn nearest_centroid(centroids: &[Vec<f64>], vector: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = vector::raw_distance(vector, centroid, VectorMetric::L2);
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u16) -> Rid {
        Rid::new(0, n)
    }

    fn clustered_points() -> Vec<(Vec<f64>, Rid)> {
        // Two clear clusters around (0, 0) and (10, 10).
        vec![
            (vec![0.0, 0.1], rid(0)),
            (vec![0.2, 0.0], rid(1)),
            (vec![-0.1, 0.1], rid(2)),
            (vec![10.0, 10.1], rid(3)),
            (vec![9.9, 10.0], rid(4)),
            (vec![10.1, 9.8], rid(5)),
        ]
    }

    #[test]
    fn build_partitions_into_lists() {
        let index = IvfFlatIndex::new(VectorMetric::L2, 2, 1);
        index.build(&clustered_points());

        let state = index.state.read();
        assert_eq!(state.centroids.len(), 2);
        let sizes: Vec<usize> = state.buckets.iter().map(|b| b.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 6);
    }

    #[test]
    fn scan_returns_nearest_first() {
        let index = IvfFlatIndex::new(VectorMetric::L2, 2, 2);
        index.build(&clustered_points());

        // Probing both lists covers every point, so the ranking is exact.
        let hits = index.scan_vector(&[0.0, 0.0], 2);
        assert_eq!(hits, vec![rid(0), rid(2)]);
    }

    #[test]
    fn probing_all_lists_returns_a_permutation() {
        let points = clustered_points();
        let index = IvfFlatIndex::new(VectorMetric::L2, 2, 2);
        index.build(&points);

        let mut hits = index.scan_vector(&[5.0, 5.0], points.len());
        hits.sort_by_key(|r| r.slot);
        let mut expected: Vec<Rid> = points.iter().map(|(_, r)| *r).collect();
        expected.sort_by_key(|r| r.slot);
        assert_eq!(hits, expected);
    }

    #[test]
    fn k_zero_scans_nothing() {
        let index = IvfFlatIndex::new(VectorMetric::L2, 2, 2);
        index.build(&clustered_points());
        assert!(index.scan_vector(&[0.0, 0.0], 0).is_empty());
    }

    #[test]
    fn empty_index_scans_empty() {
        let index = IvfFlatIndex::new(VectorMetric::L2, 4, 2);
        assert!(index.scan_vector(&[1.0], 3).is_empty());
    }

    #[test]
    fn incremental_insert_on_empty_index() {
        let index = IvfFlatIndex::new(VectorMetric::L2, 2, 2);
        assert!(index.insert(&[1.0, 1.0], rid(0)));
        assert!(index.insert(&[2.0, 2.0], rid(1)));
        assert!(index.insert(&[1.1, 1.0], rid(2)));

        let hits = index.scan_vector(&[1.0, 1.0], 1);
        assert_eq!(hits, vec![rid(0)]);
    }

    #[test]
    fn delete_removes_point() {
        let index = IvfFlatIndex::new(VectorMetric::L2, 2, 2);
        index.build(&clustered_points());
        index.delete(rid(0));

        let hits = index.scan_vector(&[0.0, 0.1], 6);
        assert!(!hits.contains(&rid(0)));
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn inner_product_metric_orders_by_negated_dot() {
        let index = IvfFlatIndex::new(VectorMetric::InnerProduct, 1, 1);
        index.build(&[
            (vec![1.0, 0.0], rid(0)),
            (vec![3.0, 0.0], rid(1)),
            (vec![2.0, 0.0], rid(2)),
        ]);
        // Larger dot product = smaller (negated) distance = better.
        let hits = index.scan_vector(&[1.0, 0.0], 3);
        assert_eq!(hits, vec![rid(1), rid(2), rid(0)]);
    }
}

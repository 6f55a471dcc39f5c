//! # Vector Distance Kernels
//!
//! Distance computation is the hottest path in vector queries: index build
//! and search both evaluate millions of pairs. The kernels here are pure
//! functions over `f64` slices, unrolled into four-lane blocks with a
//! scalar tail for dimensions that are not a multiple of four.
//!
//! ## Metrics
//!
//! All metrics are "smaller is better" so one bounded min-heap serves
//! every index:
//!
//! - **L2**: `sqrt(Σ (aᵢ − bᵢ)²)`
//! - **InnerProduct**: `−Σ aᵢ·bᵢ` (negated dot product)
//! - **Cosine**: `1 − Σ aᵢ·bᵢ / sqrt(Σ aᵢ² · Σ bᵢ²)`, `1.0` when either
//!   norm is zero
//!
//! Symmetry `dist(a, b) == dist(b, a)` holds for all three.
//!
//! ## Memoization Cache
//!
//! An opt-in, process-wide cache keyed by `(metric, unordered pair)`.
//! Disabled by default; enabling it is a [`DistanceCache::set_enabled`]
//! call away, and tests flush it between runs. The map is sharded with a
//! per-shard lock so concurrent read-and-insert is safe without a global
//! bottleneck. Both key orders resolve to the same entry, preserving the
//! symmetry contract through the cache.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Distance function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorMetric {
    L2,
    InnerProduct,
    Cosine,
}

impl VectorMetric {
    /// Parses the `vector_<metric>_ops` operator-class suffix used by
    /// `CREATE INDEX ... USING ... (col vector_l2_ops)`.
    pub fn from_ops_suffix(ops: &str) -> Option<VectorMetric> {
        match ops {
            "vector_l2_ops" => Some(VectorMetric::L2),
            "vector_ip_ops" => Some(VectorMetric::InnerProduct),
            "vector_cosine_ops" => Some(VectorMetric::Cosine),
            _ => None,
        }
    }
}

impl fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VectorMetric::L2 => "l2_dist",
            VectorMetric::InnerProduct => "inner_product",
            VectorMetric::Cosine => "cosine_similarity",
        };
        f.write_str(name)
    }
}

fn squared_l2(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    let mut i = 0;
    let (mut s0, mut s1, mut s2, mut s3) = (0.0, 0.0, 0.0, 0.0);

    while i + 4 <= n {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];
        s0 += d0 * d0;
        s1 += d1 * d1;
        s2 += d2 * d2;
        s3 += d3 * d3;
        i += 4;
    }

    let mut sum = s0 + s1 + s2 + s3;
    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }
    sum
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    let mut i = 0;
    let (mut s0, mut s1, mut s2, mut s3) = (0.0, 0.0, 0.0, 0.0);

    while i + 4 <= n {
        s0 += a[i] * b[i];
        s1 += a[i + 1] * b[i + 1];
        s2 += a[i + 2] * b[i + 2];
        s3 += a[i + 3] * b[i + 3];
        i += 4;
    }

    let mut sum = s0 + s1 + s2 + s3;
    while i < n {
        sum += a[i] * b[i];
        i += 1;
    }
    sum
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    let mut i = 0;
    let (mut dot_s, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);

    while i + 4 <= n {
        for lane in 0..4 {
            let (x, y) = (a[i + lane], b[i + lane]);
            dot_s += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        i += 4;
    }
    while i < n {
        let (x, y) = (a[i], b[i]);
        dot_s += x * y;
        norm_a += x * x;
        norm_b += y * y;
        i += 1;
    }

    let norm_product = (norm_a * norm_b).sqrt();
    if norm_product == 0.0 {
        return 1.0;
    }
    1.0 - dot_s / norm_product
}

/// Computes the distance between two equal-dimension vectors. The caller
/// guarantees the dimensions agree; the expression layer raises
/// `TypeMismatch` before reaching the kernel.
pub fn raw_distance(a: &[f64], b: &[f64], metric: VectorMetric) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "vector length mismatched");
    match metric {
        VectorMetric::L2 => squared_l2(a, b).sqrt(),
        VectorMetric::InnerProduct => -dot(a, b),
        VectorMetric::Cosine => cosine(a, b),
    }
}

/// Distance with the process-wide memoization cache consulted first.
pub fn distance(a: &[f64], b: &[f64], metric: VectorMetric) -> f64 {
    let cache = DistanceCache::global();
    if !cache.is_enabled() {
        return raw_distance(a, b, metric);
    }
    if let Some(hit) = cache.get(a, b, metric) {
        return hit;
    }
    let dist = raw_distance(a, b, metric);
    cache.put(a, b, metric, dist);
    dist
}

const CACHE_SHARDS: usize = 16;

type PairKey = (Vec<u64>, Vec<u64>);

/// Process-wide symmetric memoization of distance computations. The only
/// global mutable state in the engine; off unless a session opts in.
pub struct DistanceCache {
    enabled: AtomicBool,
    shards: Vec<RwLock<HashMap<(VectorMetric, PairKey), f64>>>,
}

impl DistanceCache {
    fn new() -> DistanceCache {
        DistanceCache {
            enabled: AtomicBool::new(false),
            shards: (0..CACHE_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    pub fn global() -> &'static DistanceCache {
        static CACHE: OnceLock<DistanceCache> = OnceLock::new();
        CACHE.get_or_init(DistanceCache::new)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Drops every cached entry; tests call this between runs.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(a: &[f64], b: &[f64]) -> PairKey {
        // Unordered pair: both (a, b) and (b, a) resolve to one entry.
        let ka: Vec<u64> = a.iter().map(|x| x.to_bits()).collect();
        let kb: Vec<u64> = b.iter().map(|x| x.to_bits()).collect();
        if ka <= kb {
            (ka, kb)
        } else {
            (kb, ka)
        }
    }

    fn shard_for(&self, key: &(VectorMetric, PairKey)) -> &RwLock<HashMap<(VectorMetric, PairKey), f64>> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % CACHE_SHARDS]
    }

    fn get(&self, a: &[f64], b: &[f64], metric: VectorMetric) -> Option<f64> {
        let key = (metric, Self::key(a, b));
        self.shard_for(&key).read().get(&key).copied()
    }

    fn put(&self, a: &[f64], b: &[f64], metric: VectorMetric, dist: f64) {
        let key = (metric, Self::key(a, b));
        self.shard_for(&key).write().insert(key, dist);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_distance_matches_definition() {
        let a = [0.0, 3.0];
        let b = [4.0, 0.0];
        assert_eq!(raw_distance(&a, &b, VectorMetric::L2), 5.0);
    }

    #[test]
    fn inner_product_is_negated() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(raw_distance(&a, &b, VectorMetric::InnerProduct), -32.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_zero() {
        let a = [1.0, 1.0];
        let b = [2.0, 2.0];
        let d = raw_distance(&a, &b, VectorMetric::Cosine);
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_one() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert_eq!(raw_distance(&a, &b, VectorMetric::Cosine), 1.0);
    }

    #[test]
    fn cosine_with_zero_vector_is_one() {
        let a = [0.0, 0.0];
        let b = [1.0, 2.0];
        assert_eq!(raw_distance(&a, &b, VectorMetric::Cosine), 1.0);
    }

    #[test]
    fn distances_are_symmetric() {
        let a = [0.1, -2.5, 3.7, 0.0, 9.9];
        let b = [4.2, 1.1, -0.3, 8.8, -7.7];
        for metric in [
            VectorMetric::L2,
            VectorMetric::InnerProduct,
            VectorMetric::Cosine,
        ] {
            assert_eq!(
                raw_distance(&a, &b, metric),
                raw_distance(&b, &a, metric),
                "{} not symmetric",
                metric
            );
        }
    }

    #[test]
    fn scalar_tail_handles_non_multiple_dimensions() {
        // 7 = one four-lane block plus a three-wide tail.
        let a: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..7).map(|i| (i * 2) as f64).collect();
        let expected: f64 = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt();
        assert_eq!(raw_distance(&a, &b, VectorMetric::L2), expected);
    }

    // The cache is process-wide and the test harness runs in parallel, so
    // every test that toggles it serializes on this lock.
    static CACHE_TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    #[test]
    fn cache_serves_both_argument_orders() {
        let _guard = CACHE_TEST_LOCK.lock();
        let cache = DistanceCache::global();
        cache.flush();
        cache.set_enabled(true);

        let a = [1.0, 2.0, 3.0];
        let b = [6.0, 5.0, 4.0];
        let forward = distance(&a, &b, VectorMetric::L2);
        let n_after_forward = cache.len();
        let backward = distance(&b, &a, VectorMetric::L2);

        assert_eq!(forward, backward);
        // Reversed order hit the same entry instead of adding one.
        assert_eq!(cache.len(), n_after_forward);

        cache.set_enabled(false);
        cache.flush();
    }

    #[test]
    fn cache_keys_include_the_metric() {
        let _guard = CACHE_TEST_LOCK.lock();
        let cache = DistanceCache::global();
        cache.flush();
        cache.set_enabled(true);

        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let l2 = distance(&a, &b, VectorMetric::L2);
        let cos = distance(&a, &b, VectorMetric::Cosine);
        assert_ne!(l2, cos);

        cache.set_enabled(false);
        cache.flush();
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let _guard = CACHE_TEST_LOCK.lock();
        let cache = DistanceCache::global();
        cache.flush();
        cache.set_enabled(false);

        distance(&[1.0], &[2.0], VectorMetric::L2);
        assert!(cache.is_empty());
    }
}

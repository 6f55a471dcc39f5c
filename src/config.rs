//! # Session Configuration
//!
//! Per-session knobs the optimizer and the vector kernel read. The only
//! process-wide setting is the distance cache toggle, which forwards to
//! the global cache (see `vector::DistanceCache`).

use crate::vector::DistanceCache;

/// Which vector index the `Sort + Limit → VectorIndexScan` rewrite may
/// target. `None` suppresses the rewrite entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorIndexMethod {
    #[default]
    None,
    IvfFlat,
    Hnsw,
}

impl VectorIndexMethod {
    /// Parses the `vector_index_method` session-variable value.
    pub fn parse(value: &str) -> Option<VectorIndexMethod> {
        match value {
            "none" => Some(VectorIndexMethod::None),
            "ivfflat" => Some(VectorIndexMethod::IvfFlat),
            "hnsw" => Some(VectorIndexMethod::Hnsw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub vector_index_method: VectorIndexMethod,
}

impl SessionConfig {
    pub fn new() -> SessionConfig {
        SessionConfig::default()
    }

    pub fn with_vector_index_method(mut self, method: VectorIndexMethod) -> SessionConfig {
        self.vector_index_method = method;
        self
    }

    /// Toggles the process-wide distance memoization cache.
    pub fn set_distance_cache(&self, enabled: bool) {
        DistanceCache::global().set_enabled(enabled);
    }
}

use serde::{Deserialize, Serialize};
use strata_core::constants::{DB_CACHE_SIZE, REGISTRY_PRUNE_THRESHOLD};

/// Tunables for the vertex state layer. Fixed at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Capacity of the LRU cache over raw keyspace lookups.
    pub db_cache_size: usize,
    /// Registry size at which slots of dropped handles are swept.
    pub registry_prune_threshold: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_cache_size: DB_CACHE_SIZE,
            registry_prune_threshold: REGISTRY_PRUNE_THRESHOLD,
        }
    }
}

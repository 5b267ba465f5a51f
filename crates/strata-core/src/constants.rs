/// ─── Strata Vertex State Constants ──────────────────────────────────────────
///
/// Encoding limits for DAG vertices and default sizing for the vertex state
/// layer. Limits are consensus-relevant: changing any of them changes which
/// byte strings are valid vertices.

// ── Codec ────────────────────────────────────────────────────────────────────

/// Version tag written as the first two bytes of every encoded vertex.
pub const CODEC_VERSION: u16 = 0;

/// Upper bound on the size of one encoded vertex (2 MiB).
pub const MAX_VERTEX_BYTES: usize = 2 * 1024 * 1024;

/// Maximum number of parent references a vertex may carry.
pub const MAX_PARENTS: usize = 128;

/// Maximum number of transaction payloads bundled in one vertex.
pub const MAX_TXS_PER_VERTEX: usize = 10_000;

/// Maximum number of restriction identifiers on one vertex.
pub const MAX_RESTRICTIONS: usize = 10_000;

/// Height of the genesis vertex. Genesis is the only vertex without parents.
pub const GENESIS_HEIGHT: u64 = 0;

// ── State layer ──────────────────────────────────────────────────────────────

/// Default capacity of the LRU cache over raw keyspace lookups.
pub const DB_CACHE_SIZE: usize = 10_000;

/// Default number of handle registry slots after which dead slots are swept.
pub const REGISTRY_PRUNE_THRESHOLD: usize = 1_000;

use std::path::Path;

use strata_core::error::StrataError;

/// One staged write. Vertex state is append-only, so there is no removal.
pub type BatchOp = (Vec<u8>, Vec<u8>);

/// Byte-oriented durable key-value store underneath the vertex state.
///
/// Implementations must apply a batch all-or-nothing: after a crash an
/// observer sees either every operation of a batch or none of them.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StrataError>;

    /// Apply `ops` atomically and make them durable before returning.
    fn write_batch(&self, ops: &[BatchOp]) -> Result<(), StrataError>;
}

/// Persistent vertex database backed by sled (pure-Rust, no C dependencies).
///
/// Everything lives in one named tree so a batch can span keyspaces:
///   0x00 ++ VertexId  → canonical vertex bytes
///   0x01 ++ VertexId  → status code (one byte)
///   0x02 ++ "edge"    → bincode(Vec<VertexId>)
pub struct SledDb {
    vertices: sled::Tree,
}

impl SledDb {
    /// Open or create the vertex database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StrataError> {
        let db = sled::open(path).map_err(|e| StrataError::Storage(e.to_string()))?;
        let vertices = db
            .open_tree("vertex_state")
            .map_err(|e| StrataError::Storage(e.to_string()))?;
        Ok(Self { vertices })
    }
}

impl Database for SledDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StrataError> {
        self.vertices
            .get(key)
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(|e| StrataError::Storage(e.to_string()))
    }

    fn write_batch(&self, ops: &[BatchOp]) -> Result<(), StrataError> {
        let mut batch = sled::Batch::default();
        for (key, value) in ops {
            batch.insert(key.as_slice(), value.as_slice());
        }
        self.vertices
            .apply_batch(batch)
            .map_err(|e| StrataError::Storage(e.to_string()))?;
        self.vertices
            .flush()
            .map_err(|e| StrataError::Storage(e.to_string()))?;
        Ok(())
    }
}

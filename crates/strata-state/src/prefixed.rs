use std::collections::BTreeSet;

use strata_core::error::StrataError;
use strata_core::types::VertexId;
use strata_dag::{Vertex, VertexStatus};

use crate::staged::{StagedStore, WriteBatch};

const VERTEX_PREFIX: u8 = 0x00;
const STATUS_PREFIX: u8 = 0x01;
const EDGE_KEY: &[u8] = b"\x02edge";

fn prefixed(prefix: u8, id: &VertexId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + id.as_bytes().len());
    key.push(prefix);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Typed view of the vertex keyspaces held in a [`StagedStore`]:
/// vertex bytes by id, status by id, and the persisted frontier.
pub struct VertexState {
    store: StagedStore,
}

impl VertexState {
    pub fn new(store: StagedStore) -> Self {
        Self { store }
    }

    /// Load and decode the vertex stored under `id`.
    ///
    /// Stored bytes were validated before they were written, so a decode
    /// failure here means the database is corrupt.
    pub fn vertex(&self, id: &VertexId) -> Result<Option<Vertex>, StrataError> {
        match self.store.get(&prefixed(VERTEX_PREFIX, id))? {
            Some(bytes) => {
                let vtx = Vertex::parse(&bytes)
                    .map_err(|e| StrataError::Serialization(format!("stored vertex {id}: {e}")))?;
                Ok(Some(vtx))
            }
            None => Ok(None),
        }
    }

    /// Stored status of `id`; `Unknown` when nothing is stored.
    pub fn status(&self, id: &VertexId) -> Result<VertexStatus, StrataError> {
        match self.store.get(&prefixed(STATUS_PREFIX, id))? {
            Some(bytes) => decode_status(id, &bytes),
            None => Ok(VertexStatus::Unknown),
        }
    }

    /// The persisted frontier, empty on a fresh database.
    pub fn edge(&self) -> Result<Vec<VertexId>, StrataError> {
        match self.store.get(EDGE_KEY)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| StrataError::Serialization(format!("stored edge: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    pub fn batch(&self) -> VertexBatch<'_> {
        VertexBatch {
            inner: self.store.batch(),
        }
    }
}

fn decode_status(id: &VertexId, bytes: &[u8]) -> Result<VertexStatus, StrataError> {
    match bytes {
        [code] => VertexStatus::from_code(*code)
            .ok_or_else(|| StrataError::Serialization(format!("vertex {id}: bad status code {code}"))),
        _ => Err(StrataError::Serialization(format!(
            "vertex {id}: status is {} bytes",
            bytes.len()
        ))),
    }
}

/// Staged writes against the vertex keyspaces, committed atomically.
pub struct VertexBatch<'a> {
    inner: WriteBatch<'a>,
}

impl<'a> VertexBatch<'a> {
    pub fn put_vertex(&mut self, vtx: &Vertex) {
        self.inner
            .put(prefixed(VERTEX_PREFIX, vtx.id()), vtx.bytes().to_vec());
    }

    pub fn put_status(&mut self, id: &VertexId, status: VertexStatus) {
        self.inner
            .put(prefixed(STATUS_PREFIX, id), vec![status.code()]);
    }

    pub fn put_edge(&mut self, edge: &BTreeSet<VertexId>) -> Result<(), StrataError> {
        let ids: Vec<&VertexId> = edge.iter().collect();
        let bytes = bincode::serialize(&ids).map_err(|e| StrataError::Serialization(e.to_string()))?;
        self.inner.put(EDGE_KEY.to_vec(), bytes);
        Ok(())
    }

    pub fn commit(self) -> Result<(), StrataError> {
        self.inner.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::memdb::MemoryDb;
    use std::sync::Arc;
    use strata_core::types::ChainId;

    fn state() -> (VertexState, MemoryDb) {
        let db = MemoryDb::new();
        (VertexState::new(StagedStore::new(Arc::new(db.clone()), 64)), db)
    }

    fn genesis() -> Vertex {
        Vertex::build(ChainId::from_bytes([1; 32]), 0, 0, vec![], vec![b"g".to_vec()], vec![]).unwrap()
    }

    #[test]
    fn fresh_state_is_empty() {
        let (state, _db) = state();
        let id = VertexId::from_bytes([4; 32]);
        assert!(state.vertex(&id).unwrap().is_none());
        assert_eq!(state.status(&id).unwrap(), VertexStatus::Unknown);
        assert!(state.edge().unwrap().is_empty());
    }

    #[test]
    fn keyspaces_round_trip() {
        let (state, _db) = state();
        let vtx = genesis();
        let edge: BTreeSet<VertexId> = [vtx.id().clone()].into_iter().collect();

        let mut batch = state.batch();
        batch.put_vertex(&vtx);
        batch.put_status(vtx.id(), VertexStatus::Accepted);
        batch.put_edge(&edge).unwrap();
        batch.commit().unwrap();

        assert_eq!(state.vertex(vtx.id()).unwrap(), Some(vtx.clone()));
        assert_eq!(state.status(vtx.id()).unwrap(), VertexStatus::Accepted);
        assert_eq!(state.edge().unwrap(), vec![vtx.id().clone()]);
    }

    #[test]
    fn corrupt_status_is_serialization_error() {
        let (state, db) = state();
        let id = VertexId::from_bytes([8; 32]);
        db.write_batch(&[(prefixed(STATUS_PREFIX, &id), vec![42])]).unwrap();
        let err = state.status(&id).unwrap_err();
        assert!(matches!(err, StrataError::Serialization(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn keys_do_not_collide_across_keyspaces() {
        let id = VertexId::from_bytes([0; 32]);
        assert_ne!(prefixed(VERTEX_PREFIX, &id), prefixed(STATUS_PREFIX, &id));
        assert_ne!(prefixed(VERTEX_PREFIX, &id).as_slice(), EDGE_KEY);
    }
}

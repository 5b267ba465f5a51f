use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::error::StrataError;
use strata_core::types::VertexId;
use strata_dag::{Vertex, VertexStatus};
use tracing::{debug, error, info};

use crate::serializer::{child_height, Serializer};
use crate::vm::Tx;

/// What this process knows about the vertex. `vertex` is `Some` exactly
/// when `status` is not `Unknown`.
struct Resolved {
    vertex: Option<Arc<Vertex>>,
    status: VertexStatus,
}

/// The single in-process representative of a vertex id.
///
/// Obtained only through the [`Serializer`], which guarantees that while a
/// handle is alive every lookup of its id yields this same handle. The
/// record is loaded from the store on first access. Parents are held as
/// ids and resolved through the serializer on demand.
pub struct VertexHandle {
    id: VertexId,
    serializer: Serializer,
    resolved: Mutex<Resolved>,
}

impl VertexHandle {
    pub(crate) fn new(id: VertexId, serializer: Serializer) -> Self {
        Self {
            id,
            serializer,
            resolved: Mutex::new(Resolved {
                vertex: None,
                status: VertexStatus::Unknown,
            }),
        }
    }

    pub fn id(&self) -> &VertexId {
        &self.id
    }

    /// Current status, loading from the store if nothing is known yet.
    /// `Unknown` means the vertex does not exist locally.
    pub fn status(&self) -> Result<VertexStatus, StrataError> {
        let mut resolved = self.resolved.lock();
        self.refresh(&mut resolved)?;
        Ok(resolved.status)
    }

    /// The immutable record; `UnknownVertex` if it has not been fetched.
    pub fn vertex(&self) -> Result<Arc<Vertex>, StrataError> {
        let mut resolved = self.resolved.lock();
        self.refresh(&mut resolved)?;
        resolved
            .vertex
            .clone()
            .ok_or_else(|| StrataError::UnknownVertex(self.id.clone()))
    }

    /// Resolve every parent to its canonical handle.
    pub fn parents(&self) -> Result<Vec<Arc<VertexHandle>>, StrataError> {
        let vertex = self.vertex()?;
        vertex
            .parent_ids()
            .iter()
            .map(|id| self.serializer.resolve_parent(id))
            .collect()
    }

    /// Decode the carried payloads through the VM.
    pub fn txs(&self) -> Result<Vec<Arc<dyn Tx>>, StrataError> {
        let vertex = self.vertex()?;
        let vm = self.serializer.vm();
        vertex.txs().iter().map(|bytes| vm.parse_tx(bytes)).collect()
    }

    /// Check the vertex against its surroundings: all parents resolve, the
    /// height follows from theirs, and the VM accepts every transaction.
    pub fn verify(&self) -> Result<(), StrataError> {
        let vertex = self.vertex()?;

        let mut heights = Vec::with_capacity(vertex.parent_ids().len());
        for parent in self.parents()? {
            heights.push(parent.vertex()?.height());
        }
        let expected = child_height(&heights)?;
        if vertex.height() != expected {
            return Err(StrataError::InvalidHeight {
                expected,
                got: vertex.height(),
            });
        }

        for tx in self.txs()? {
            tx.verify()?;
        }
        Ok(())
    }

    pub fn accept(&self) -> Result<(), StrataError> {
        self.decide(VertexStatus::Accepted)
    }

    pub fn reject(&self) -> Result<(), StrataError> {
        self.decide(VertexStatus::Rejected)
    }

    /// Install a freshly built or parsed record.
    ///
    /// A no-op when the same record is already known; persists the bytes
    /// with status `Processing` otherwise. A different record under the
    /// same id is an invariant violation.
    pub(crate) fn set_vertex(&self, vtx: Vertex) -> Result<(), StrataError> {
        if vtx.id() != &self.id {
            error!(vtx_id = %self.id, got = %vtx.id(), "record installed under wrong id");
            return Err(StrataError::invariant(
                &self.id,
                format!("record hashes to {}", vtx.id()),
            ));
        }

        let mut resolved = self.resolved.lock();
        self.refresh(&mut resolved)?;
        if let Some(existing) = &resolved.vertex {
            if existing.bytes() != vtx.bytes() {
                error!(vtx_id = %self.id, "conflicting records for one vertex id");
                return Err(StrataError::invariant(&self.id, "conflicting record"));
            }
            return Ok(());
        }

        let mut batch = self.serializer.state().batch();
        batch.put_vertex(&vtx);
        batch.put_status(&self.id, VertexStatus::Processing);
        batch.commit().map_err(|e| self.store_failure(e))?;

        resolved.vertex = Some(Arc::new(vtx));
        resolved.status = VertexStatus::Processing;
        Ok(())
    }

    /// Load record and status from the store while nothing is known.
    fn refresh(&self, resolved: &mut Resolved) -> Result<(), StrataError> {
        if resolved.status.fetched() {
            return Ok(());
        }

        let state = self.serializer.state();
        let status = state.status(&self.id).map_err(|e| self.store_failure(e))?;
        if !status.fetched() {
            return Ok(());
        }
        let vertex = state
            .vertex(&self.id)
            .map_err(|e| self.store_failure(e))?
            .ok_or_else(|| StrataError::invariant(&self.id, "status stored without vertex bytes"))?;
        if vertex.id() != &self.id {
            return Err(StrataError::invariant(
                &self.id,
                format!("stored bytes hash to {}", vertex.id()),
            ));
        }

        debug!(vtx_id = %self.id, %status, "loaded vertex from store");
        resolved.vertex = Some(Arc::new(vertex));
        resolved.status = status;
        Ok(())
    }

    /// Move to a terminal status. Held under this handle's lock for the
    /// whole check-commit-update sequence, so two racing decisions are
    /// serialized and the loser sees the winner's status.
    fn decide(&self, next: VertexStatus) -> Result<(), StrataError> {
        let mut resolved = self.resolved.lock();
        self.refresh(&mut resolved)?;

        let current = resolved.status;
        if current == next {
            return Ok(());
        }
        if current == VertexStatus::Unknown {
            return Err(StrataError::UnknownVertex(self.id.clone()));
        }
        if !current.can_transition_to(next) {
            error!(vtx_id = %self.id, %current, %next, "illegal status transition");
            return Err(StrataError::invariant(
                &self.id,
                format!("cannot move {current} vertex to {next}"),
            ));
        }

        let vertex = resolved
            .vertex
            .clone()
            .ok_or_else(|| StrataError::invariant(&self.id, "fetched status without record"))?;
        let committed = match next {
            VertexStatus::Accepted => self.serializer.commit_accept(&vertex),
            _ => self.serializer.commit_reject(&self.id),
        };
        committed.map_err(|e| self.store_failure(e))?;

        resolved.status = next;
        info!(vtx_id = %self.id, height = vertex.height(), status = %next, "vertex decided");
        Ok(())
    }

    fn store_failure(&self, e: StrataError) -> StrataError {
        let e = e.for_vertex(&self.id);
        if e.is_fatal() {
            error!(vtx_id = %self.id, error = %e, "vertex state store failure");
        }
        e
    }
}

impl fmt::Debug for VertexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateConfig;
    use crate::memdb::MemoryDb;
    use crate::serializer::Context;
    use crate::vm::{RawTx, RawVm};
    use strata_core::types::ChainId;

    fn chain() -> ChainId {
        ChainId::from_bytes([0x42; 32])
    }

    fn serializer(db: &MemoryDb) -> Serializer {
        Serializer::initialize(
            Context { chain_id: chain() },
            Arc::new(RawVm::new()),
            Arc::new(db.clone()),
            &StateConfig::default(),
        )
        .unwrap()
    }

    fn tx(payload: &str) -> Arc<dyn Tx> {
        Arc::new(RawTx::new(payload.as_bytes().to_vec()))
    }

    #[test]
    fn concurrent_gets_share_one_handle() {
        let db = MemoryDb::new();
        let s = serializer(&db);
        let g = s.build(0, &[], &[], &[]).unwrap();
        let id = g.id().clone();
        drop(g);

        let handles: Vec<Arc<VertexHandle>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| s.get(&id).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        for h in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], h));
        }
        handles[0].accept().unwrap();
        for h in &handles {
            assert_eq!(h.status().unwrap(), VertexStatus::Accepted);
        }
    }

    #[test]
    fn racing_terminal_decisions_yield_one_winner() {
        let s = serializer(&MemoryDb::new());
        let g = s.build(0, &[], &[], &[]).unwrap();

        let (accepted, rejected) = std::thread::scope(|scope| {
            let a = scope.spawn(|| g.accept());
            let r = scope.spawn(|| g.reject());
            (a.join().unwrap(), r.join().unwrap())
        });

        assert!(accepted.is_ok() != rejected.is_ok());
        let loser = accepted.err().or(rejected.err()).unwrap();
        assert!(matches!(loser, StrataError::InvariantViolation { .. }));
        assert!(loser.is_fatal());
    }

    #[test]
    fn repeated_decision_is_idempotent() {
        let db = MemoryDb::new();
        let s = serializer(&db);
        let g = s.build(0, &[], &[], &[]).unwrap();
        g.accept().unwrap();
        let batches = db.batches();
        g.accept().unwrap();
        assert_eq!(db.batches(), batches);
    }

    #[test]
    fn rejected_cannot_be_accepted() {
        let s = serializer(&MemoryDb::new());
        let g = s.build(0, &[], &[], &[]).unwrap();
        g.reject().unwrap();
        let err = g.accept().unwrap_err();
        assert!(matches!(err, StrataError::InvariantViolation { ref id, .. } if id == g.id()));
        assert!(s.edge().is_empty());
    }

    #[test]
    fn status_loads_lazily_from_store() {
        let db = MemoryDb::new();
        let id = {
            let s = serializer(&db);
            let g = s.build(0, &[], &[tx("lazy")], &[]).unwrap();
            g.accept().unwrap();
            g.id().clone()
        };

        let s = serializer(&db);
        let reads = db.reads();
        let h = s.get(&id).unwrap();
        assert!(db.reads() > reads);
        assert_eq!(h.status().unwrap(), VertexStatus::Accepted);
        assert_eq!(h.vertex().unwrap().txs(), &[b"lazy".to_vec()]);
    }

    #[test]
    fn conflicting_record_is_invariant_violation() {
        let s = serializer(&MemoryDb::new());
        let g = s.build(0, &[], &[], &[]).unwrap();
        let other = Vertex::build(chain(), 0, 9, vec![], vec![], vec![]).unwrap();
        let err = g.set_vertex(other).unwrap_err();
        assert!(matches!(err, StrataError::InvariantViolation { .. }));
    }

    #[test]
    fn parents_resolve_through_serializer() {
        let s = serializer(&MemoryDb::new());
        let g = s.build(0, &[], &[], &[]).unwrap();
        let child = s.build(0, &[g.id().clone()], &[tx("c")], &[]).unwrap();
        let parents = child.parents().unwrap();
        assert_eq!(parents.len(), 1);
        assert!(Arc::ptr_eq(&parents[0], &g));
    }

    #[test]
    fn verify_checks_height_and_transactions() {
        let s = serializer(&MemoryDb::new());
        let g = s.build(0, &[], &[], &[]).unwrap();
        let child = s.build(0, &[g.id().clone()], &[tx("ok")], &[]).unwrap();
        assert!(child.verify().is_ok());

        // Peer claims height 5 on top of genesis.
        let skewed = Vertex::build(chain(), 5, 0, vec![g.id().clone()], vec![b"x".to_vec()], vec![]).unwrap();
        let h = s.parse(skewed.bytes()).unwrap();
        assert!(matches!(
            h.verify(),
            Err(StrataError::InvalidHeight { expected: 1, got: 5 })
        ));

        let empty_tx = s.build(0, &[g.id().clone()], &[tx("")], &[]).unwrap();
        assert!(matches!(empty_tx.verify(), Err(StrataError::TxRejected(_))));
    }

    #[test]
    fn verify_reports_missing_parent() {
        let s = serializer(&MemoryDb::new());
        let orphan_parent = VertexId::from_bytes([0x77; 32]);
        let orphan = Vertex::build(chain(), 1, 0, vec![orphan_parent.clone()], vec![], vec![]).unwrap();
        let h = s.parse(orphan.bytes()).unwrap();
        assert!(matches!(h.verify(), Err(StrataError::UnknownParent(id)) if id == orphan_parent));
    }

    #[test]
    fn failed_decision_commit_names_the_vertex() {
        let db = MemoryDb::new();
        let s = serializer(&db);
        let g = s.build(0, &[], &[], &[]).unwrap();

        db.fail_writes(true);
        let err = g.accept().unwrap_err();
        assert!(matches!(err, StrataError::Storage(_)));
        assert!(err.is_fatal());
        assert!(err.to_string().contains(&g.id().to_hex()));
        assert!(g.reject().unwrap_err().to_string().contains(&g.id().to_hex()));
    }

    #[test]
    fn failed_record_write_names_the_vertex() {
        let donor = serializer(&MemoryDb::new());
        let built = donor.build(3, &[], &[tx("x")], &[]).unwrap();

        let db = MemoryDb::new();
        let s = serializer(&db);
        db.fail_writes(true);
        let err = s.parse(built.vertex().unwrap().bytes()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(&built.id().to_hex()));

        db.fail_writes(false);
        let restarted = serializer(&db);
        db.fail_reads(true);
        let err = restarted.get(built.id()).unwrap_err();
        assert!(matches!(err, StrataError::Storage(_)));
        assert!(err.to_string().contains(&built.id().to_hex()));
    }
}

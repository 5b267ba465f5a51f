use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use strata_core::constants::GENESIS_HEIGHT;
use strata_core::error::StrataError;
use strata_core::types::{ChainId, TxId, VertexId};
use strata_dag::{Vertex, VertexStatus};
use tracing::{debug, info, warn};

use crate::config::StateConfig;
use crate::db::Database;
use crate::handle::VertexHandle;
use crate::prefixed::VertexState;
use crate::staged::StagedStore;
use crate::vm::{DagVm, Tx};

/// Node-supplied facts the serializer checks vertices against.
#[derive(Debug, Clone)]
pub struct Context {
    pub chain_id: ChainId,
}

/// Height of a vertex whose parents sit at `parent_heights`: one above the
/// tallest parent, or the genesis height when there are no parents.
pub fn child_height(parent_heights: &[u64]) -> Result<u64, StrataError> {
    match parent_heights.iter().max() {
        None => Ok(GENESIS_HEIGHT),
        Some(h) => h
            .checked_add(1)
            .ok_or_else(|| StrataError::BuildConstraint("vertex height overflow".into())),
    }
}

// ── Handle registry ───────────────────────────────────────────────────────────

/// Identifier → canonical handle.
///
/// Slots are weak: a handle lives exactly as long as some caller holds it,
/// and while it lives every lookup of its id returns it.
struct Registry {
    handles: HashMap<VertexId, Weak<VertexHandle>>,
    threshold: usize,
    prune_at: usize,
}

impl Registry {
    fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            handles: HashMap::new(),
            threshold,
            prune_at: threshold,
        }
    }

    fn live(&self, id: &VertexId) -> Option<Arc<VertexHandle>> {
        self.handles.get(id).and_then(Weak::upgrade)
    }

    fn insert(&mut self, id: VertexId, handle: &Arc<VertexHandle>) {
        if self.handles.len() >= self.prune_at {
            self.handles.retain(|_, slot| slot.strong_count() > 0);
            self.prune_at = self.threshold.max(self.handles.len() * 2);
        }
        self.handles.insert(id, Arc::downgrade(handle));
    }

    fn live_count(&self) -> usize {
        self.handles.values().filter(|slot| slot.strong_count() > 0).count()
    }
}

// ── Serializer ────────────────────────────────────────────────────────────────

struct Inner {
    ctx: Context,
    vm: Arc<dyn DagVm>,
    state: VertexState,
    registry: Mutex<Registry>,
    /// Accepted vertices with no accepted child. Mirrors the persisted edge.
    edge: Mutex<BTreeSet<VertexId>>,
}

/// Manages the vertices of one chain's DAG: parsing, building, resolving
/// by id, and the accepted frontier.
///
/// Cloning is cheap and every clone shares the same store, registry and
/// frontier. Create one per chain per process.
#[derive(Clone)]
pub struct Serializer {
    inner: Arc<Inner>,
}

impl Serializer {
    /// Wire the staged store, cache and registry over `db`, and reload the
    /// persisted frontier.
    pub fn initialize(
        ctx: Context,
        vm: Arc<dyn DagVm>,
        db: Arc<dyn Database>,
        config: &StateConfig,
    ) -> Result<Self, StrataError> {
        let state = VertexState::new(StagedStore::new(db, config.db_cache_size));
        let edge: BTreeSet<VertexId> = state.edge()?.into_iter().collect();
        info!(
            chain_id = %ctx.chain_id,
            edge = edge.len(),
            cache = config.db_cache_size,
            "vertex state initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                ctx,
                vm,
                state,
                registry: Mutex::new(Registry::new(config.registry_prune_threshold)),
                edge: Mutex::new(edge),
            }),
        })
    }

    /// Decode vertex bytes from a peer and return its canonical handle.
    ///
    /// The first time an id is seen its bytes are persisted with status
    /// `Processing`; a known vertex keeps whatever status it already has.
    pub fn parse(&self, bytes: &[u8]) -> Result<Arc<VertexHandle>, StrataError> {
        let vtx = Vertex::parse(bytes)?;
        if let Err(e) = vtx.verify_chain(&self.inner.ctx.chain_id) {
            warn!(vtx_id = %vtx.id(), error = %e, "rejecting vertex from another chain");
            return Err(e);
        }

        let handle = self.handle(vtx.id());
        handle.set_vertex(vtx)?;
        debug!(vtx_id = %handle.id(), "parsed vertex");
        Ok(handle)
    }

    /// Build a new vertex on top of `parent_ids`.
    ///
    /// Every parent must resolve. The new height is one above the tallest
    /// parent. With no parents the vertex is a height-0 root, whatever the
    /// frontier holds, so a chain may have several.
    pub fn build(
        &self,
        epoch: u32,
        parent_ids: &[VertexId],
        txs: &[Arc<dyn Tx>],
        restrictions: &[TxId],
    ) -> Result<Arc<VertexHandle>, StrataError> {
        let mut heights = Vec::with_capacity(parent_ids.len());
        for parent_id in parent_ids {
            let parent = self.resolve_parent(parent_id)?;
            heights.push(parent.vertex()?.height());
        }
        let height = child_height(&heights)?;

        let tx_bytes = txs.iter().map(|tx| tx.bytes().to_vec()).collect();
        let vtx = Vertex::build(
            self.inner.ctx.chain_id.clone(),
            height,
            epoch,
            parent_ids.to_vec(),
            tx_bytes,
            restrictions.to_vec(),
        )?;

        // Content addressing: an identical vertex may already be registered
        // or stored, in which case set_vertex leaves it untouched.
        let handle = self.handle(vtx.id());
        handle.set_vertex(vtx)?;
        debug!(vtx_id = %handle.id(), height, parents = parent_ids.len(), "built vertex");
        Ok(handle)
    }

    /// Build a vertex from whatever transactions the VM has pending.
    pub fn build_pending(
        &self,
        epoch: u32,
        parent_ids: &[VertexId],
        restrictions: &[TxId],
    ) -> Result<Arc<VertexHandle>, StrataError> {
        let txs = self.inner.vm.pending_txs();
        self.build(epoch, parent_ids, &txs, restrictions)
    }

    /// Resolve `id` to its canonical handle; `UnknownVertex` if nothing is
    /// known locally.
    pub fn get(&self, id: &VertexId) -> Result<Arc<VertexHandle>, StrataError> {
        let handle = self.handle(id);
        if handle.status()? == VertexStatus::Unknown {
            return Err(StrataError::UnknownVertex(id.clone()));
        }
        Ok(handle)
    }

    /// Snapshot of the current frontier, in ascending id order.
    pub fn edge(&self) -> Vec<VertexId> {
        self.inner.edge.lock().iter().cloned().collect()
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.inner.ctx.chain_id
    }

    /// Number of handles currently held by some caller.
    pub fn live_handles(&self) -> usize {
        self.inner.registry.lock().live_count()
    }

    pub(crate) fn vm(&self) -> &dyn DagVm {
        self.inner.vm.as_ref()
    }

    pub(crate) fn state(&self) -> &VertexState {
        &self.inner.state
    }

    pub(crate) fn resolve_parent(&self, id: &VertexId) -> Result<Arc<VertexHandle>, StrataError> {
        self.get(id).map_err(|e| match e {
            StrataError::UnknownVertex(id) => StrataError::UnknownParent(id),
            other => other,
        })
    }

    /// Resolve-or-create under one registry lock. No I/O happens here.
    fn handle(&self, id: &VertexId) -> Arc<VertexHandle> {
        let mut registry = self.inner.registry.lock();
        if let Some(handle) = registry.live(id) {
            return handle;
        }
        let handle = Arc::new(VertexHandle::new(id.clone(), self.clone()));
        registry.insert(id.clone(), &handle);
        handle
    }

    /// Persist `Accepted` for `vtx` together with the frontier that results
    /// from it: parents leave, the vertex joins. One atomic batch.
    pub(crate) fn commit_accept(&self, vtx: &Vertex) -> Result<(), StrataError> {
        let mut edge = self.inner.edge.lock();
        let mut next = edge.clone();
        for parent_id in vtx.parent_ids() {
            next.remove(parent_id);
        }
        next.insert(vtx.id().clone());

        let mut batch = self.inner.state.batch();
        batch.put_status(vtx.id(), VertexStatus::Accepted);
        batch.put_edge(&next)?;
        batch.commit()?;

        *edge = next;
        Ok(())
    }

    pub(crate) fn commit_reject(&self, id: &VertexId) -> Result<(), StrataError> {
        let mut batch = self.inner.state.batch();
        batch.put_status(id, VertexStatus::Rejected);
        batch.commit()
    }
}

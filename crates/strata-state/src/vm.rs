//! Seam to the virtual machine that owns transaction semantics.
//!
//! The vertex state layer treats transactions as opaque payloads. It only
//! needs the VM to hand over payloads for a build and to parse or verify the
//! payloads a vertex carries.

use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::error::StrataError;
use strata_core::types::TxId;
use strata_crypto::tx_id_from_bytes;

pub trait Tx: Send + Sync {
    fn id(&self) -> TxId;

    fn bytes(&self) -> &[u8];

    /// VM-specific validity check (signatures, conflicts, ...).
    fn verify(&self) -> Result<(), StrataError>;
}

pub trait DagVm: Send + Sync {
    fn parse_tx(&self, bytes: &[u8]) -> Result<Arc<dyn Tx>, StrataError>;

    /// Drain the transactions waiting to be put into a vertex.
    fn pending_txs(&self) -> Vec<Arc<dyn Tx>>;
}

/// A transaction whose payload is its only content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTx {
    id: TxId,
    bytes: Vec<u8>,
}

impl RawTx {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            id: tx_id_from_bytes(&bytes),
            bytes,
        }
    }
}

impl Tx for RawTx {
    fn id(&self) -> TxId {
        self.id.clone()
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn verify(&self) -> Result<(), StrataError> {
        if self.bytes.is_empty() {
            return Err(StrataError::TxRejected(format!("{}: empty payload", self.id)));
        }
        Ok(())
    }
}

/// VM that accepts any non-empty payload. Used by the CLI and tests.
#[derive(Default)]
pub struct RawVm {
    pending: Mutex<Vec<Arc<dyn Tx>>>,
}

impl RawVm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload for the next `build_pending`.
    pub fn submit(&self, bytes: Vec<u8>) -> TxId {
        let tx = RawTx::new(bytes);
        let id = tx.id();
        self.pending.lock().push(Arc::new(tx));
        id
    }
}

impl DagVm for RawVm {
    fn parse_tx(&self, bytes: &[u8]) -> Result<Arc<dyn Tx>, StrataError> {
        Ok(Arc::new(RawTx::new(bytes.to_vec())))
    }

    fn pending_txs(&self) -> Vec<Arc<dyn Tx>> {
        std::mem::take(&mut *self.pending.lock())
    }
}

use strata_core::types::{TxId, VertexId};

/// Compute BLAKE3 hash of arbitrary bytes → 32-byte array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Derive a VertexId from the canonical encoded vertex bytes.
pub fn vertex_id_from_bytes(vertex_bytes: &[u8]) -> VertexId {
    VertexId::from_bytes(blake3_hash(vertex_bytes))
}

/// Derive a TxId from an opaque transaction payload.
pub fn tx_id_from_bytes(tx_bytes: &[u8]) -> TxId {
    TxId::from_bytes(blake3_hash(tx_bytes))
}

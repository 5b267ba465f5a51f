use thiserror::Error;

use crate::types::{ChainId, VertexId};

#[derive(Debug, Error)]
pub enum StrataError {
    // ── Codec errors ─────────────────────────────────────────────────────────
    #[error("malformed vertex bytes: {0}")]
    MalformedBytes(String),

    #[error("unsupported vertex codec version {got} (expected {expected})")]
    UnsupportedCodecVersion { expected: u16, got: u16 },

    #[error("vertex belongs to chain {got}, expected {expected}")]
    ChainMismatch { expected: ChainId, got: ChainId },

    // ── DAG errors ───────────────────────────────────────────────────────────
    #[error("unknown parent vertex: {0}")]
    UnknownParent(VertexId),

    #[error("unknown vertex: {0}")]
    UnknownVertex(VertexId),

    #[error("build constraint violated: {0}")]
    BuildConstraint(String),

    #[error("vertex height {got} does not follow its parents (expected {expected})")]
    InvalidHeight { expected: u64, got: u64 },

    // ── VM collaborator ──────────────────────────────────────────────────────
    #[error("transaction rejected: {0}")]
    TxRejected(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Internal consistency ─────────────────────────────────────────────────
    #[error("invariant violated for vertex {id}: {reason}")]
    InvariantViolation { id: VertexId, reason: String },
}

impl StrataError {
    /// Whether the node must halt rather than keep running on this error.
    ///
    /// Store failures and invariant violations mean in-memory and durable
    /// state may have diverged. `Serialization` only arises when decoding
    /// bytes this node persisted itself, so it is treated as corruption.
    /// Everything else is a rejected operation the caller can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StrataError::Storage(_)
                | StrataError::Serialization(_)
                | StrataError::InvariantViolation { .. }
        )
    }

    pub fn invariant(id: &VertexId, reason: impl Into<String>) -> Self {
        StrataError::InvariantViolation {
            id: id.clone(),
            reason: reason.into(),
        }
    }

    /// Attach the offending vertex to a store or decode failure so the halt
    /// diagnostic names it. Other variants already carry their id or are
    /// not fatal, and are returned unchanged.
    pub fn for_vertex(self, id: &VertexId) -> Self {
        let tag = |msg: String| {
            if msg.contains(&id.to_hex()) {
                msg
            } else {
                format!("vertex {id}: {msg}")
            }
        };
        match self {
            StrataError::Storage(msg) => StrataError::Storage(tag(msg)),
            StrataError::Serialization(msg) => StrataError::Serialization(tag(msg)),
            other => other,
        }
    }
}

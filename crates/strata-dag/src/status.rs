use serde::{Deserialize, Serialize};

/// Consensus status of a vertex.
///
/// Transitions form a lattice: `Unknown → Processing → {Accepted, Rejected}`.
/// `Accepted` and `Rejected` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexStatus {
    /// No record of this vertex exists locally.
    Unknown,
    /// Bytes are known; consensus has not decided yet.
    Processing,
    /// Decided in favour. Eligible for the frontier.
    Accepted,
    /// Decided against. Kept for audit, never part of the frontier.
    Rejected,
}

impl VertexStatus {
    /// One-byte code used in the persisted status keyspace.
    pub fn code(self) -> u8 {
        match self {
            VertexStatus::Unknown => 0,
            VertexStatus::Processing => 1,
            VertexStatus::Accepted => 2,
            VertexStatus::Rejected => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(VertexStatus::Unknown),
            1 => Some(VertexStatus::Processing),
            2 => Some(VertexStatus::Accepted),
            3 => Some(VertexStatus::Rejected),
            _ => None,
        }
    }

    /// Whether the vertex bytes are available locally.
    pub fn fetched(self) -> bool {
        !matches!(self, VertexStatus::Unknown)
    }

    /// Whether moving from `self` to `next` is a forward step of the lattice.
    pub fn can_transition_to(self, next: VertexStatus) -> bool {
        matches!(
            (self, next),
            (VertexStatus::Unknown, VertexStatus::Processing)
                | (VertexStatus::Processing, VertexStatus::Accepted)
                | (VertexStatus::Processing, VertexStatus::Rejected)
        )
    }
}

impl std::fmt::Display for VertexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VertexStatus::Unknown => "unknown",
            VertexStatus::Processing => "processing",
            VertexStatus::Accepted => "accepted",
            VertexStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

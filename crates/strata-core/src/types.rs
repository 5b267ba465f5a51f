use serde::{Deserialize, Serialize};
use std::fmt;

/// Width in bytes of every identifier in the system.
pub const ID_LEN: usize = 32;

/// Defines a 32-byte identifier newtype with hex display and conversions.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; ID_LEN]);

        impl $name {
            pub fn from_bytes(b: [u8; ID_LEN]) -> Self {
                Self(b)
            }

            pub fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let mut arr = [0u8; ID_LEN];
                hex::decode_to_slice(s, &mut arr)?;
                Ok(Self(arr))
            }

            /// Build from a slice, returning `None` unless it is exactly 32 bytes.
            pub fn from_slice(b: &[u8]) -> Option<Self> {
                <[u8; ID_LEN]>::try_from(b).ok().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}…)", stringify!($name), &self.to_hex()[..16])
            }
        }
    };
}

// ── VertexId ─────────────────────────────────────────────────────────────────

id_type! {
    /// 32-byte vertex identifier: BLAKE3 of the canonical encoded vertex.
    VertexId
}

// ── ChainId ──────────────────────────────────────────────────────────────────

id_type! {
    /// Identifies the ledger a vertex belongs to.
    ChainId
}

// ── TxId ─────────────────────────────────────────────────────────────────────

id_type! {
    /// 32-byte transaction identifier: BLAKE3 of the opaque payload bytes.
    /// Also used for restriction entries.
    TxId
}

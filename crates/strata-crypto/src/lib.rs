pub mod hash;

pub use hash::{blake3_hash, tx_id_from_bytes, vertex_id_from_bytes};

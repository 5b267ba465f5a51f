use bincode::Options;
use serde::{Deserialize, Serialize};
use strata_core::constants::{CODEC_VERSION, MAX_VERTEX_BYTES};
use strata_core::error::StrataError;
use strata_core::types::{ChainId, TxId, VertexId};
use strata_crypto::{tx_id_from_bytes, vertex_id_from_bytes};

use crate::validation::validate_structure;

/// Length of the big-endian codec version prefix.
const VERSION_LEN: usize = 2;

/// Everything after the version prefix, in wire order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct VertexBody {
    chain_id: ChainId,
    height: u64,
    epoch: u32,
    parent_ids: Vec<VertexId>,
    txs: Vec<Vec<u8>>,
    restrictions: Vec<TxId>,
}

/// Fixed-width big-endian bincode, bounded, with no trailing bytes allowed.
/// Every body has exactly one encoding under these options.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit(MAX_VERTEX_BYTES as u64)
        .reject_trailing_bytes()
}

/// An immutable, structurally valid DAG vertex.
///
/// The identifier is the BLAKE3 hash of the canonical encoding, so two
/// vertices with equal content always share bytes and identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vertex {
    id: VertexId,
    bytes: Vec<u8>,
    body: VertexBody,
}

impl Vertex {
    /// Construct a vertex and its canonical encoding.
    ///
    /// Parents and restrictions are sorted, transactions are sorted by
    /// content hash; duplicates in any list are rejected. A vertex without
    /// parents must sit at the genesis height.
    pub fn build(
        chain_id: ChainId,
        height: u64,
        epoch: u32,
        mut parent_ids: Vec<VertexId>,
        mut txs: Vec<Vec<u8>>,
        mut restrictions: Vec<TxId>,
    ) -> Result<Self, StrataError> {
        parent_ids.sort();
        txs.sort_by_cached_key(|tx| tx_id_from_bytes(tx));
        restrictions.sort();

        validate_structure(height, &parent_ids, &txs, &restrictions)
            .map_err(|e| StrataError::BuildConstraint(e.to_string()))?;

        let body = VertexBody {
            chain_id,
            height,
            epoch,
            parent_ids,
            txs,
            restrictions,
        };
        let encoded = codec()
            .serialize(&body)
            .map_err(|e| StrataError::BuildConstraint(format!("encoding vertex: {e}")))?;

        let mut bytes = Vec::with_capacity(VERSION_LEN + encoded.len());
        bytes.extend_from_slice(&CODEC_VERSION.to_be_bytes());
        bytes.extend_from_slice(&encoded);
        if bytes.len() > MAX_VERTEX_BYTES {
            return Err(StrataError::BuildConstraint(format!(
                "encoded vertex is {} bytes, max {MAX_VERTEX_BYTES}",
                bytes.len()
            )));
        }

        Ok(Self::from_parts(bytes, body))
    }

    /// Decode a vertex from bytes received from a peer or read from disk.
    ///
    /// Only structure is checked here. Which chain the vertex belongs to is
    /// the caller's concern; see [`Vertex::verify_chain`].
    pub fn parse(bytes: &[u8]) -> Result<Self, StrataError> {
        if bytes.len() > MAX_VERTEX_BYTES {
            return Err(StrataError::MalformedBytes(format!(
                "{} bytes exceeds max {MAX_VERTEX_BYTES}",
                bytes.len()
            )));
        }
        if bytes.len() < VERSION_LEN {
            return Err(StrataError::MalformedBytes("truncated codec version".into()));
        }
        let version = u16::from_be_bytes([bytes[0], bytes[1]]);
        if version != CODEC_VERSION {
            return Err(StrataError::UnsupportedCodecVersion {
                expected: CODEC_VERSION,
                got: version,
            });
        }

        let body: VertexBody = codec()
            .deserialize(&bytes[VERSION_LEN..])
            .map_err(|e| StrataError::MalformedBytes(e.to_string()))?;
        validate_structure(body.height, &body.parent_ids, &body.txs, &body.restrictions)
            .map_err(|e| StrataError::MalformedBytes(e.to_string()))?;

        Ok(Self::from_parts(bytes.to_vec(), body))
    }

    fn from_parts(bytes: Vec<u8>, body: VertexBody) -> Self {
        Self {
            id: vertex_id_from_bytes(&bytes),
            bytes,
            body,
        }
    }

    /// Fail with `ChainMismatch` unless this vertex belongs to `expected`.
    pub fn verify_chain(&self, expected: &ChainId) -> Result<(), StrataError> {
        if &self.body.chain_id != expected {
            return Err(StrataError::ChainMismatch {
                expected: expected.clone(),
                got: self.body.chain_id.clone(),
            });
        }
        Ok(())
    }

    pub fn id(&self) -> &VertexId {
        &self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.body.chain_id
    }

    pub fn height(&self) -> u64 {
        self.body.height
    }

    pub fn epoch(&self) -> u32 {
        self.body.epoch
    }

    pub fn parent_ids(&self) -> &[VertexId] {
        &self.body.parent_ids
    }

    pub fn txs(&self) -> &[Vec<u8>] {
        &self.body.txs
    }

    pub fn restrictions(&self) -> &[TxId] {
        &self.body.restrictions
    }

    pub fn is_genesis(&self) -> bool {
        self.body.parent_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ChainId {
        ChainId::from_bytes([0xC0; 32])
    }

    fn vid(b: u8) -> VertexId {
        VertexId::from_bytes([b; 32])
    }

    fn raw_bytes(body: &VertexBody, version: u16) -> Vec<u8> {
        let mut bytes = version.to_be_bytes().to_vec();
        bytes.extend(codec().serialize(body).unwrap());
        bytes
    }

    #[test]
    fn genesis_builds() {
        let vtx = Vertex::build(chain(), 0, 0, vec![], vec![b"tx".to_vec()], vec![]).unwrap();
        assert!(vtx.is_genesis());
        assert_eq!(vtx.height(), 0);
        assert_eq!(vtx.id(), &vertex_id_from_bytes(vtx.bytes()));
    }

    #[test]
    fn non_genesis_without_parents_is_build_error() {
        let err = Vertex::build(chain(), 4, 0, vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, StrataError::BuildConstraint(_)));
    }

    #[test]
    fn duplicate_parents_are_build_error() {
        let err = Vertex::build(chain(), 1, 0, vec![vid(1), vid(1)], vec![], vec![]).unwrap_err();
        assert!(matches!(err, StrataError::BuildConstraint(_)));
    }

    #[test]
    fn input_order_does_not_change_encoding() {
        let a = Vertex::build(
            chain(),
            2,
            7,
            vec![vid(1), vid(2)],
            vec![b"x".to_vec(), b"y".to_vec()],
            vec![TxId::from_bytes([3; 32]), TxId::from_bytes([4; 32])],
        )
        .unwrap();
        let b = Vertex::build(
            chain(),
            2,
            7,
            vec![vid(2), vid(1)],
            vec![b"y".to_vec(), b"x".to_vec()],
            vec![TxId::from_bytes([4; 32]), TxId::from_bytes([3; 32])],
        )
        .unwrap();
        assert_eq!(a.bytes(), b.bytes());
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn parse_reproduces_built_vertex() {
        let built = Vertex::build(
            chain(),
            5,
            1,
            vec![vid(9), vid(3)],
            vec![b"alpha".to_vec(), b"beta".to_vec()],
            vec![TxId::from_bytes([1; 32])],
        )
        .unwrap();
        let parsed = Vertex::parse(built.bytes()).unwrap();
        assert_eq!(parsed, built);
        assert_eq!(parsed.parent_ids(), &[vid(3), vid(9)]);
    }

    #[test]
    fn truncated_input_is_malformed() {
        let built = Vertex::build(chain(), 1, 0, vec![vid(1)], vec![b"t".to_vec()], vec![]).unwrap();
        let cut = &built.bytes()[..built.bytes().len() - 1];
        assert!(matches!(Vertex::parse(cut), Err(StrataError::MalformedBytes(_))));
        assert!(matches!(Vertex::parse(&[0]), Err(StrataError::MalformedBytes(_))));
        assert!(matches!(Vertex::parse(&[]), Err(StrataError::MalformedBytes(_))));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let built = Vertex::build(chain(), 0, 0, vec![], vec![], vec![]).unwrap();
        let mut bytes = built.bytes().to_vec();
        bytes.push(0);
        assert!(matches!(Vertex::parse(&bytes), Err(StrataError::MalformedBytes(_))));
    }

    #[test]
    fn unknown_version_fails_fast() {
        let built = Vertex::build(chain(), 0, 0, vec![], vec![], vec![]).unwrap();
        let mut bytes = built.bytes().to_vec();
        bytes[1] = 1;
        assert!(matches!(
            Vertex::parse(&bytes),
            Err(StrataError::UnsupportedCodecVersion { expected: 0, got: 1 })
        ));
    }

    #[test]
    fn non_canonical_encoding_is_malformed() {
        let body = VertexBody {
            chain_id: chain(),
            height: 1,
            epoch: 0,
            parent_ids: vec![vid(2), vid(1)],
            txs: vec![],
            restrictions: vec![],
        };
        let bytes = raw_bytes(&body, CODEC_VERSION);
        assert!(matches!(Vertex::parse(&bytes), Err(StrataError::MalformedBytes(_))));
    }

    #[test]
    fn oversized_parent_count_is_malformed() {
        // Claims u64::MAX parents but carries none.
        let mut bytes = CODEC_VERSION.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0xC0; 32]);
        bytes.extend_from_slice(&1u64.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(Vertex::parse(&bytes), Err(StrataError::MalformedBytes(_))));
    }

    #[test]
    fn chain_mismatch_is_distinct_from_malformed() {
        let vtx = Vertex::build(chain(), 0, 0, vec![], vec![], vec![]).unwrap();
        let other = ChainId::from_bytes([0xEE; 32]);
        assert!(vtx.verify_chain(&chain()).is_ok());
        assert!(matches!(
            vtx.verify_chain(&other),
            Err(StrataError::ChainMismatch { .. })
        ));
    }
}

use strata_core::constants::{GENESIS_HEIGHT, MAX_PARENTS, MAX_RESTRICTIONS, MAX_TXS_PER_VERTEX};
use strata_core::types::{TxId, VertexId};
use strata_crypto::tx_id_from_bytes;
use thiserror::Error;

/// Why a vertex body is not well-formed.
///
/// The codec maps these onto `StrataError::BuildConstraint` when building
/// and `StrataError::MalformedBytes` when parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("vertex at height {height} has no parents")]
    MissingParents { height: u64 },

    #[error("genesis-height vertex references {count} parents")]
    GenesisWithParents { count: usize },

    #[error("too many parents: max {max}, got {got}")]
    TooManyParents { max: usize, got: usize },

    #[error("too many transactions: max {max}, got {got}")]
    TooManyTxs { max: usize, got: usize },

    #[error("too many restrictions: max {max}, got {got}")]
    TooManyRestrictions { max: usize, got: usize },

    #[error("{0} are not sorted and unique")]
    NotCanonical(&'static str),
}

/// Check the structural rules every vertex body must satisfy.
///
/// Checks (in order):
/// 1. Genesis rule: no parents iff height is the genesis height
/// 2. Count limits on parents, transactions and restrictions
/// 3. Canonical order: parents and restrictions strictly ascending,
///    transactions strictly ascending by content hash
///
/// Nothing here looks at other vertices; parent existence and height
/// consistency are checked by the state layer.
pub fn validate_structure(
    height: u64,
    parent_ids: &[VertexId],
    txs: &[Vec<u8>],
    restrictions: &[TxId],
) -> Result<(), StructureError> {
    // ── 1. Genesis rule ──────────────────────────────────────────────────────
    if parent_ids.is_empty() && height != GENESIS_HEIGHT {
        return Err(StructureError::MissingParents { height });
    }
    if !parent_ids.is_empty() && height == GENESIS_HEIGHT {
        return Err(StructureError::GenesisWithParents {
            count: parent_ids.len(),
        });
    }

    // ── 2. Limits ────────────────────────────────────────────────────────────
    if parent_ids.len() > MAX_PARENTS {
        return Err(StructureError::TooManyParents {
            max: MAX_PARENTS,
            got: parent_ids.len(),
        });
    }
    if txs.len() > MAX_TXS_PER_VERTEX {
        return Err(StructureError::TooManyTxs {
            max: MAX_TXS_PER_VERTEX,
            got: txs.len(),
        });
    }
    if restrictions.len() > MAX_RESTRICTIONS {
        return Err(StructureError::TooManyRestrictions {
            max: MAX_RESTRICTIONS,
            got: restrictions.len(),
        });
    }

    // ── 3. Canonical order ───────────────────────────────────────────────────
    if !strictly_ascending(parent_ids) {
        return Err(StructureError::NotCanonical("parent ids"));
    }
    let tx_ids: Vec<TxId> = txs.iter().map(|tx| tx_id_from_bytes(tx)).collect();
    if !strictly_ascending(&tx_ids) {
        return Err(StructureError::NotCanonical("transactions"));
    }
    if !strictly_ascending(restrictions) {
        return Err(StructureError::NotCanonical("restrictions"));
    }

    Ok(())
}

fn strictly_ascending<T: Ord>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(b: u8) -> VertexId {
        VertexId::from_bytes([b; 32])
    }

    #[test]
    fn genesis_without_parents_passes() {
        assert!(validate_structure(0, &[], &[], &[]).is_ok());
    }

    #[test]
    fn non_genesis_without_parents_fails() {
        assert_eq!(
            validate_structure(3, &[], &[], &[]),
            Err(StructureError::MissingParents { height: 3 })
        );
    }

    #[test]
    fn genesis_height_with_parents_fails() {
        assert_eq!(
            validate_structure(0, &[vid(1)], &[], &[]),
            Err(StructureError::GenesisWithParents { count: 1 })
        );
    }

    #[test]
    fn unsorted_or_duplicate_parents_fail() {
        let unsorted = validate_structure(1, &[vid(2), vid(1)], &[], &[]);
        assert_eq!(unsorted, Err(StructureError::NotCanonical("parent ids")));
        let dup = validate_structure(1, &[vid(1), vid(1)], &[], &[]);
        assert_eq!(dup, Err(StructureError::NotCanonical("parent ids")));
    }

    #[test]
    fn transactions_must_be_ordered_by_hash() {
        let mut txs = vec![b"a".to_vec(), b"b".to_vec()];
        txs.sort_by_key(|tx| tx_id_from_bytes(tx));
        assert!(validate_structure(0, &[], &txs, &[]).is_ok());
        txs.reverse();
        assert_eq!(
            validate_structure(0, &[], &txs, &[]),
            Err(StructureError::NotCanonical("transactions"))
        );
    }

    #[test]
    fn too_many_parents_fails() {
        let parents: Vec<VertexId> = (0..=MAX_PARENTS)
            .map(|i| {
                let mut b = [0u8; 32];
                b[..8].copy_from_slice(&(i as u64).to_be_bytes());
                VertexId::from_bytes(b)
            })
            .collect();
        assert!(matches!(
            validate_structure(1, &parents, &[], &[]),
            Err(StructureError::TooManyParents { .. })
        ));
    }
}

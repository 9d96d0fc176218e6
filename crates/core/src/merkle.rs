//! Merkle aggregation of transaction digests.
//!
//! The fold is a pairwise-overlap reduction, not a balanced binary tree:
//! every round hashes each adjacent pair `(layer[i], layer[i + 1])`, so a
//! layer of `n` digests becomes a layer of `n - 1`. Block hashes depend on
//! the exact output, so the rule must not be swapped for the textbook one.

use crate::hash::{hash_concat, Hash};
use crate::transaction::SignedTransaction;
use thiserror::Error;

/// Errors that can occur while folding digests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("cannot aggregate an empty transaction set")]
    EmptyTransactionSet,
}

/// Combine two adjacent digests: `SHA256(hex(left) + "-" + hex(right))`.
fn combine(left: &Hash, right: &Hash) -> Hash {
    hash_concat(&[
        left.to_hex().as_bytes(),
        b"-",
        right.to_hex().as_bytes(),
    ])
}

/// Compute the merkle root of an ordered list of digests.
pub fn merkle_root(hashes: &[Hash]) -> Result<Hash, MerkleError> {
    if hashes.is_empty() {
        return Err(MerkleError::EmptyTransactionSet);
    }

    let mut layer: Vec<Hash> = hashes.to_vec();
    while layer.len() > 1 {
        layer = layer.windows(2).map(|pair| combine(&pair[0], &pair[1])).collect();
    }

    Ok(layer[0])
}

/// Compute the merkle root over the digests of `transactions`, in order.
pub fn transactions_root(transactions: &[SignedTransaction]) -> Result<Hash, MerkleError> {
    let digests: Vec<Hash> = transactions.iter().map(|tx| tx.digest()).collect();
    merkle_root(&digests)
}

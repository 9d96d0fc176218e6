//! Blocks and proof-of-work mining.

use crate::hash::{hash_concat, Hash};
use crate::merkle::{transactions_root, MerkleError};
use crate::pow::{self, Miner, MiningError, MiningOutcome};
use crate::transaction::SignedTransaction;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("a block needs at least one transaction")]
    EmptyTransactionSet,
}

impl From<MerkleError> for BlockError {
    fn from(err: MerkleError) -> Self {
        match err {
            MerkleError::EmptyTransactionSet => BlockError::EmptyTransactionSet,
        }
    }
}

/// A batch of signed transactions chained to its predecessor by hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the ledger, assigned on append.
    index: u64,
    timestamp: DateTime<Utc>,
    /// Hash of the preceding block; `None` only for the first block.
    previous_hash: Option<Hash>,
    transactions: Vec<SignedTransaction>,
    merkle_root: Hash,
    hash: Hash,
    nonce: u64,
}

impl Block {
    /// Create an unmined block with `nonce = 0`.
    ///
    /// `previous_hash` is provisional: the ledger overwrites it on append.
    pub fn new(
        timestamp: DateTime<Utc>,
        previous_hash: Option<Hash>,
        transactions: Vec<SignedTransaction>,
    ) -> Result<Self, BlockError> {
        let merkle_root = transactions_root(&transactions)?;

        let mut block = Self {
            index: 0,
            timestamp,
            previous_hash,
            transactions,
            merkle_root,
            hash: Hash::ZERO,
            nonce: 0,
        };
        block.hash = block.calculate_hash();
        Ok(block)
    }

    /// Create an unmined block stamped with the current time.
    pub fn now(transactions: Vec<SignedTransaction>) -> Result<Self, BlockError> {
        Self::new(Utc::now(), None, transactions)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn previous_hash(&self) -> Option<Hash> {
        self.previous_hash
    }

    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.transactions
    }

    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Everything hashed before the nonce:
    /// `timestamp "-" previous_hash "-" digests "-"`.
    fn preimage_prefix(&self) -> String {
        let previous = self
            .previous_hash
            .map(|h| h.to_hex())
            .unwrap_or_default();
        let digests: Vec<String> = self
            .transactions
            .iter()
            .map(|tx| tx.digest().to_hex())
            .collect();

        format!(
            "{}-{}-{}-",
            self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            previous,
            digests.join(",")
        )
    }

    fn hash_with_prefix(prefix: &str, nonce: u64) -> Hash {
        hash_concat(&[prefix.as_bytes(), nonce.to_string().as_bytes()])
    }

    /// Recompute the hash from the stored fields.
    pub fn calculate_hash(&self) -> Hash {
        Self::hash_with_prefix(&self.preimage_prefix(), self.nonce)
    }

    /// Check the stored hash against the stored fields.
    pub fn verify_hash(&self) -> bool {
        self.calculate_hash() == self.hash
    }

    /// Verify the merkle root matches the transactions.
    pub fn verify_merkle_root(&self) -> bool {
        transactions_root(&self.transactions).is_ok_and(|root| root == self.merkle_root)
    }

    /// Whether the stored hash satisfies `difficulty`.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::meets_difficulty(&self.hash, difficulty)
    }

    /// Link this block into a ledger position.
    ///
    /// Resets the nonce and recomputes the hash, so the block has to be mined
    /// again afterwards.
    pub fn attach(&mut self, index: u64, previous_hash: Option<Hash>) {
        self.index = index;
        self.previous_hash = previous_hash;
        self.nonce = 0;
        self.hash = self.calculate_hash();
    }

    /// Mine sequentially from the current nonce until `difficulty` is met.
    pub fn mine(&mut self, difficulty: u32) -> Result<MiningOutcome, MiningError> {
        self.mine_with(difficulty, &Miner::default())
    }

    /// Mine with an explicit miner (parallelism, attempt bound, cancellation).
    ///
    /// On error the block keeps its previous nonce and hash.
    pub fn mine_with(&mut self, difficulty: u32, miner: &Miner) -> Result<MiningOutcome, MiningError> {
        if self.meets_difficulty(difficulty) {
            return Ok(MiningOutcome {
                nonce: self.nonce,
                hash: self.hash,
                attempts: 0,
            });
        }

        let prefix = self.preimage_prefix();
        let outcome = miner.search(self.nonce, difficulty, |nonce| {
            Self::hash_with_prefix(&prefix, nonce)
        })?;

        self.nonce = outcome.nonce;
        self.hash = outcome.hash;
        Ok(outcome)
    }
}

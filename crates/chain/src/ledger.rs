//! The append-only ledger.
//!
//! The ledger is the only place where blocks are linked: on append it sets
//! the previous hash, mines under its own difficulty and assigns the index.

use powchain_core::{Block, CancelToken, Hash, Miner, MiningConfig, MiningError, SignedTransaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while appending.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("mining failed: {0}")]
    Mining(#[from] MiningError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// The first integrity violation found by [`Ledger::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainLinkageError {
    #[error("block {position} carries index {found}")]
    UnexpectedIndex { position: u64, found: u64 },

    #[error("block {index}: stored hash does not match its contents")]
    HashMismatch { index: u64 },

    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: u32 },

    #[error("block {index}: merkle root does not match its transactions")]
    MerkleRootMismatch { index: u64 },

    #[error("block 0 must not reference a previous hash")]
    GenesisHasPrevious,

    #[error("block {index}: previous hash does not match its predecessor")]
    BrokenLink { index: u64 },

    #[error("block {index}: transaction {position} has an invalid signature")]
    InvalidSignature { index: u64, position: usize },
}

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every block hash.
    pub difficulty: u32,
    /// Nonce search settings.
    pub mining: MiningConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            mining: MiningConfig::default(),
        }
    }
}

/// Ledger statistics.
#[derive(Debug, Clone)]
pub struct LedgerStats {
    /// Number of blocks.
    pub height: u64,
    /// Hash of the latest block, if any.
    pub latest_block_hash: Option<Hash>,
    /// Total transactions across all blocks.
    pub transaction_count: usize,
    pub difficulty: u32,
}

/// An ordered, append-only chain of mined blocks.
#[derive(Debug)]
pub struct Ledger {
    blocks: Vec<Block>,
    difficulty: u32,
    miner: Miner,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger with the default configuration.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// Create an empty ledger with the given configuration.
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            blocks: Vec::new(),
            difficulty: config.difficulty,
            miner: Miner::new(config.mining),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get the latest block.
    pub fn last(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Get a block by index.
    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Transactions of the block at `index`.
    pub fn transactions(&self, index: u64) -> Option<&[SignedTransaction]> {
        self.get(index).map(Block::transactions)
    }

    /// A handle that aborts the mining step of an in-flight append.
    ///
    /// Cancelling affects only the append that observes it: the token is
    /// re-armed when that append returns, so the ledger keeps accepting blocks.
    pub fn cancel_token(&self) -> CancelToken {
        self.miner.cancel_token()
    }

    /// Link, mine and append a block.
    ///
    /// Any previous hash or nonce set by the caller is discarded. If mining
    /// fails the ledger is left unchanged.
    pub fn append(&mut self, mut block: Block) -> Result<&Block> {
        let index = self.blocks.len() as u64;
        let previous_hash = self.blocks.last().map(Block::hash);

        block.attach(index, previous_hash);
        let outcome = match block.mine_with(self.difficulty, &self.miner) {
            Ok(outcome) => outcome,
            Err(e @ MiningError::Cancelled { .. }) => {
                self.miner.cancel_token().reset();
                tracing::warn!(index, "append cancelled");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            index,
            hash = %block.hash(),
            nonce = outcome.nonce,
            attempts = outcome.attempts,
            transactions = block.tx_count(),
            "block appended"
        );

        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Check every block: index, hash, work, merkle root, linkage and
    /// transaction signatures. Stops at the first violation.
    pub fn verify_chain(&self) -> std::result::Result<(), ChainLinkageError> {
        let mut previous: Option<&Block> = None;

        for (position, block) in self.blocks.iter().enumerate() {
            let index = position as u64;
            if block.index() != index {
                return Err(ChainLinkageError::UnexpectedIndex {
                    position: index,
                    found: block.index(),
                });
            }
            if !block.verify_hash() {
                return Err(ChainLinkageError::HashMismatch { index });
            }
            if !block.meets_difficulty(self.difficulty) {
                return Err(ChainLinkageError::InsufficientWork {
                    index,
                    difficulty: self.difficulty,
                });
            }
            if !block.verify_merkle_root() {
                return Err(ChainLinkageError::MerkleRootMismatch { index });
            }

            match previous {
                None if block.previous_hash().is_some() => {
                    return Err(ChainLinkageError::GenesisHasPrevious);
                }
                Some(parent) if block.previous_hash() != Some(parent.hash()) => {
                    return Err(ChainLinkageError::BrokenLink { index });
                }
                _ => {}
            }

            if let Some(position) = block
                .transactions()
                .iter()
                .position(|tx| !tx.verify_digest() || !tx.validate_signature())
            {
                return Err(ChainLinkageError::InvalidSignature { index, position });
            }

            previous = Some(block);
        }

        Ok(())
    }

    /// Whether the whole chain passes [`verify_chain`](Self::verify_chain).
    pub fn validate_chain(&self) -> bool {
        match self.verify_chain() {
            Ok(()) => true,
            Err(fault) => {
                tracing::warn!(%fault, "chain validation failed");
                false
            }
        }
    }

    /// Get ledger statistics.
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            height: self.blocks.len() as u64,
            latest_block_hash: self.last().map(Block::hash),
            transaction_count: self.blocks.iter().map(Block::tx_count).sum(),
            difficulty: self.difficulty,
        }
    }
}

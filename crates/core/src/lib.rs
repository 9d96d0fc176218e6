//! Core ledger primitives for powchain.
//!
//! This crate provides the integrity engine the ledger is built on:
//! - SHA-256 hashing with lowercase hex rendering
//! - ECDSA key pairs (P-256, SPKI / PKCS#8 encodings) and signatures
//! - Signed value-transfer transactions
//! - The pairwise-overlap merkle fold
//! - Blocks and proof-of-work mining

pub mod block;
pub mod crypto;
pub mod hash;
pub mod merkle;
pub mod pow;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{Block, BlockError};
pub use crypto::{CryptoError, KeyPair, PrivateKey, PublicKey, Signature};
pub use hash::{hash, hash_concat, Hash, H256};
pub use merkle::{merkle_root, transactions_root, MerkleError};
pub use pow::{meets_difficulty, CancelToken, Miner, MiningConfig, MiningError, MiningOutcome};
pub use transaction::{SignedTransaction, TransactionError};

//! Wallet bookkeeping on top of the ledger.
//!
//! A wallet owns many key pairs: a fresh one for every incoming payment and
//! every outgoing transfer. Keys are indexed by public key, so balance and
//! history are a single pass over the chain with constant-time ownership
//! checks.

use crate::ledger::Ledger;
use powchain_core::{CryptoError, KeyPair, PublicKey, SignedTransaction, TransactionError};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("key error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

pub type Result<T> = std::result::Result<T, WalletError>;

/// Which side of a transfer the wallet was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// One wallet-relevant movement found in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub block_index: u64,
    pub direction: Direction,
    pub amount: f64,
}

/// A named holder of key pairs.
#[derive(Debug)]
pub struct Wallet {
    name: String,
    keys: HashMap<PublicKey, KeyPair>,
}

impl Wallet {
    /// Create an empty wallet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of key pairs held.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Check if a public key belongs to this wallet.
    pub fn owns(&self, key: &PublicKey) -> bool {
        self.keys.contains_key(key)
    }

    fn fresh_keypair(&mut self) -> Result<KeyPair> {
        let keypair = KeyPair::generate()?;
        self.keys.insert(keypair.public_key.clone(), keypair.clone());
        Ok(keypair)
    }

    /// Generate a key to receive a payment on.
    pub fn receive_key(&mut self) -> Result<PublicKey> {
        Ok(self.fresh_keypair()?.public_key)
    }

    /// Sign a transfer of `amount` to `receiver` from a fresh key.
    pub fn send(&mut self, receiver: PublicKey, amount: f64) -> Result<SignedTransaction> {
        let keypair = self.fresh_keypair()?;
        Ok(SignedTransaction::transfer(receiver, &keypair, amount)?)
    }

    /// Movements involving this wallet, in chain order.
    ///
    /// A transfer between two keys of the same wallet shows up twice.
    pub fn history(&self, ledger: &Ledger) -> Vec<HistoryEntry> {
        let mut entries = Vec::new();
        if self.keys.is_empty() {
            return entries;
        }

        for block in ledger.blocks() {
            for tx in block.transactions() {
                if self.owns(tx.owner_public_key()) {
                    entries.push(HistoryEntry {
                        block_index: block.index(),
                        direction: Direction::Sent,
                        amount: tx.amount(),
                    });
                }
                if self.owns(tx.receiver_public_key()) {
                    entries.push(HistoryEntry {
                        block_index: block.index(),
                        direction: Direction::Received,
                        amount: tx.amount(),
                    });
                }
            }
        }

        entries
    }

    /// Received minus sent over the whole chain.
    ///
    /// No overdraft rule exists, so the result may be negative.
    pub fn balance(&self, ledger: &Ledger) -> f64 {
        self.history(ledger)
            .iter()
            .map(|entry| match entry.direction {
                Direction::Sent => -entry.amount,
                Direction::Received => entry.amount,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerConfig;
    use powchain_core::Block;

    fn ledger() -> Ledger {
        Ledger::with_config(LedgerConfig {
            difficulty: 1,
            ..LedgerConfig::default()
        })
    }

    #[test]
    fn test_new_wallet_is_empty() {
        let wallet = Wallet::new("Alice");
        assert_eq!(wallet.name(), "Alice");
        assert_eq!(wallet.key_count(), 0);
        assert_eq!(wallet.balance(&ledger()), 0.0);
    }

    #[test]
    fn test_fresh_key_per_operation() {
        let mut alice = Wallet::new("Alice");
        let k1 = alice.receive_key().unwrap();
        let k2 = alice.receive_key().unwrap();
        let tx = alice.send(k1.clone(), 1.0).unwrap();

        assert_ne!(k1, k2);
        assert_eq!(alice.key_count(), 3);
        assert!(alice.owns(&k1));
        assert!(alice.owns(tx.owner_public_key()));
        assert!(tx.validate_signature());
    }

    #[test]
    fn test_balance_and_history() {
        let mut chain = ledger();
        let mut issuer = Wallet::new("issuer");
        let mut alice = Wallet::new("Alice");
        let mut bob = Wallet::new("Bob");

        let tx = issuer.send(alice.receive_key().unwrap(), 100.0).unwrap();
        chain.append(Block::now(vec![tx]).unwrap()).unwrap();

        let tx = alice.send(bob.receive_key().unwrap(), 30.0).unwrap();
        chain.append(Block::now(vec![tx]).unwrap()).unwrap();

        assert_eq!(alice.balance(&chain), 70.0);
        assert_eq!(bob.balance(&chain), 30.0);
        assert_eq!(issuer.balance(&chain), -100.0);

        assert_eq!(
            alice.history(&chain),
            vec![
                HistoryEntry {
                    block_index: 0,
                    direction: Direction::Received,
                    amount: 100.0
                },
                HistoryEntry {
                    block_index: 1,
                    direction: Direction::Sent,
                    amount: 30.0
                },
            ]
        );
    }

    #[test]
    fn test_self_transfer_nets_to_zero() {
        let mut chain = ledger();
        let mut alice = Wallet::new("Alice");
        let key = alice.receive_key().unwrap();
        let tx = alice.send(key, 12.0).unwrap();
        chain.append(Block::now(vec![tx]).unwrap()).unwrap();

        assert_eq!(alice.history(&chain).len(), 2);
        assert_eq!(alice.balance(&chain), 0.0);
    }
}

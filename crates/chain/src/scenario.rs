//! Named-wallet scenarios for demos and tests.
//!
//! A [`Scenario`] owns a ledger and a set of wallets addressed by name, and
//! turns batches of `from -> to` transfers into mined blocks.

use crate::ledger::{Ledger, LedgerConfig, LedgerError};
use crate::wallet::{Wallet, WalletError};
use powchain_core::{Block, BlockError};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while driving a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unknown wallet: {0}")]
    UnknownWallet(String),

    #[error("wallet already exists: {0}")]
    DuplicateWallet(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

/// A transfer between two named wallets.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

impl Transfer {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }
}

/// A ledger plus the wallets that trade on it.
#[derive(Debug)]
pub struct Scenario {
    ledger: Ledger,
    /// Wallets in creation order.
    wallets: Vec<Wallet>,
    by_name: HashMap<String, usize>,
    /// Source of minted funds; never listed among the wallets.
    issuer: Wallet,
}

impl Scenario {
    /// Create a scenario with an empty ledger.
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            ledger: Ledger::with_config(config),
            wallets: Vec::new(),
            by_name: HashMap::new(),
            issuer: Wallet::new("InitialUser"),
        }
    }

    /// The six-user script: a 100 grant to Alice, then three blocks of
    /// four transfers each.
    pub fn reference(config: LedgerConfig) -> Result<Self> {
        let mut scenario = Self::new(config);
        for name in ["Alice", "Bob", "Roger", "Charlie", "Silvia"] {
            scenario.add_wallet(name)?;
        }

        scenario.mint("Alice", 100.0)?;
        scenario.commit(&[
            Transfer::new("Alice", "Bob", 5.0),
            Transfer::new("Bob", "Roger", 5.0),
            Transfer::new("Roger", "Charlie", 5.0),
            Transfer::new("Charlie", "Silvia", 5.0),
        ])?;
        scenario.commit(&[
            Transfer::new("Alice", "Bob", 10.0),
            Transfer::new("Bob", "Roger", 20.0),
            Transfer::new("Roger", "Charlie", 30.0),
            Transfer::new("Charlie", "Silvia", 40.0),
        ])?;
        scenario.commit(&[
            Transfer::new("Alice", "Bob", 50.0),
            Transfer::new("Bob", "Roger", 60.0),
            Transfer::new("Bob", "Roger", 60.0),
            Transfer::new("Roger", "Charlie", 70.0),
        ])?;

        Ok(scenario)
    }

    /// Register a new, empty wallet.
    pub fn add_wallet(&mut self, name: &str) -> Result<&mut Wallet> {
        if self.by_name.contains_key(name) {
            return Err(ScenarioError::DuplicateWallet(name.to_string()));
        }
        let index = self.wallets.len();
        self.by_name.insert(name.to_string(), index);
        self.wallets.push(Wallet::new(name));
        Ok(&mut self.wallets[index])
    }

    pub fn wallet(&self, name: &str) -> Option<&Wallet> {
        self.by_name.get(name).map(|&i| &self.wallets[i])
    }

    fn wallet_mut(&mut self, name: &str) -> Result<&mut Wallet> {
        match self.by_name.get(name) {
            Some(&i) => Ok(&mut self.wallets[i]),
            None => Err(ScenarioError::UnknownWallet(name.to_string())),
        }
    }

    /// Wallets in creation order.
    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Grant `amount` to `to` from the issuer, in a block of its own.
    pub fn mint(&mut self, to: &str, amount: f64) -> Result<&Block> {
        let receiver = self.wallet_mut(to)?.receive_key()?;
        let tx = self.issuer.send(receiver, amount)?;
        Ok(self.ledger.append(Block::now(vec![tx])?)?)
    }

    /// Sign every transfer and append them as one block.
    pub fn commit(&mut self, transfers: &[Transfer]) -> Result<&Block> {
        for transfer in transfers {
            for name in [&transfer.from, &transfer.to] {
                if !self.by_name.contains_key(name.as_str()) {
                    return Err(ScenarioError::UnknownWallet(name.clone()));
                }
            }
        }

        let mut transactions = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            let receiver = self.wallet_mut(&transfer.to)?.receive_key()?;
            let tx = self.wallet_mut(&transfer.from)?.send(receiver, transfer.amount)?;
            transactions.push(tx);
        }

        tracing::debug!(transactions = transactions.len(), "committing batch");
        Ok(self.ledger.append(Block::now(transactions)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LedgerConfig {
        LedgerConfig {
            difficulty: 1,
            ..LedgerConfig::default()
        }
    }

    #[test]
    fn test_duplicate_wallet_rejected() {
        let mut scenario = Scenario::new(config());
        scenario.add_wallet("Alice").unwrap();
        assert!(matches!(
            scenario.add_wallet("Alice"),
            Err(ScenarioError::DuplicateWallet(_))
        ));
    }

    #[test]
    fn test_unknown_wallet_rejected_before_signing() {
        let mut scenario = Scenario::new(config());
        scenario.add_wallet("Alice").unwrap();

        let result = scenario.commit(&[Transfer::new("Alice", "Mallory", 1.0)]);
        assert!(matches!(result, Err(ScenarioError::UnknownWallet(name)) if name == "Mallory"));
        assert_eq!(scenario.wallet("Alice").unwrap().key_count(), 0);
        assert!(scenario.ledger().is_empty());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut scenario = Scenario::new(config());
        assert!(matches!(
            scenario.commit(&[]),
            Err(ScenarioError::Block(BlockError::EmptyTransactionSet))
        ));
    }

    #[test]
    fn test_mint_and_commit() {
        let mut scenario = Scenario::new(config());
        scenario.add_wallet("Alice").unwrap();
        scenario.add_wallet("Bob").unwrap();

        scenario.mint("Alice", 50.0).unwrap();
        let block = scenario
            .commit(&[Transfer::new("Alice", "Bob", 20.0)])
            .unwrap();
        assert_eq!(block.index(), 1);

        let ledger = scenario.ledger();
        assert_eq!(scenario.wallet("Alice").unwrap().balance(ledger), 30.0);
        assert_eq!(scenario.wallet("Bob").unwrap().balance(ledger), 20.0);
        assert!(ledger.validate_chain());
    }
}

//! Ledger orchestration for powchain.
//!
//! This crate builds on the core primitives:
//! - **Ledger**: append-only chain that links, mines and validates blocks
//! - **Wallet**: per-user key bookkeeping, balances and history
//! - **Scenario**: named wallets trading on a ledger, for demos and tests
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_chain::{Ledger, LedgerConfig};
//! use powchain_core::{Block, KeyPair, SignedTransaction};
//!
//! let receiver = KeyPair::generate().unwrap();
//! let sender = KeyPair::generate().unwrap();
//! let tx = SignedTransaction::transfer(receiver.public_key.clone(), &sender, 100.0).unwrap();
//!
//! let mut ledger = Ledger::with_config(LedgerConfig::default());
//! let block = ledger.append(Block::now(vec![tx]).unwrap()).unwrap();
//! assert!(block.hash().to_hex().starts_with("00"));
//! assert!(ledger.validate_chain());
//! ```

pub mod ledger;
pub mod scenario;
pub mod wallet;

// Re-export commonly used types
pub use ledger::{ChainLinkageError, Ledger, LedgerConfig, LedgerError, LedgerStats};
pub use scenario::{Scenario, ScenarioError, Transfer};
pub use wallet::{Direction, HistoryEntry, Wallet, WalletError};

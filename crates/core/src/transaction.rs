//! Signed value-transfer transactions.

use crate::crypto::{CryptoError, KeyPair, PrivateKey, PublicKey, Signature};
use crate::hash::{hash_concat, Hash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("amount must be a finite, non-negative number (got {0})")]
    InvalidAmount(f64),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// A value transfer from `owner_public_key` to `receiver_public_key`.
///
/// The digest and signature are produced at construction and never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    amount: f64,
    receiver_public_key: PublicKey,
    owner_public_key: PublicKey,
    digest: Hash,
    signature: Signature,
}

/// Canonical digest: `SHA256(amount + "-" + base64(receiver))`.
///
/// `amount` uses the shortest decimal that round-trips, without exponent.
/// Callers normalise `-0.0` to `0.0` first so zero always renders as `"0"`.
fn transaction_digest(amount: f64, receiver: &PublicKey) -> Hash {
    let amount_repr = amount.to_string();
    hash_concat(&[
        amount_repr.as_bytes(),
        b"-",
        receiver.to_base64().as_bytes(),
    ])
}

impl SignedTransaction {
    /// Create and sign a transfer of `amount` to `receiver`.
    ///
    /// `sender` is recorded as the owner key; the signature is made with
    /// `sender_private_key`.
    pub fn new(
        receiver: PublicKey,
        sender: PublicKey,
        amount: f64,
        sender_private_key: &PrivateKey,
    ) -> Result<Self, TransactionError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(TransactionError::InvalidAmount(amount));
        }
        let amount = if amount == 0.0 { 0.0 } else { amount };

        let digest = transaction_digest(amount, &receiver);
        let signature = sender_private_key.sign(digest.to_hex().as_bytes())?;

        Ok(Self {
            amount,
            receiver_public_key: receiver,
            owner_public_key: sender,
            digest,
            signature,
        })
    }

    /// Create a transfer signed by `sender`.
    pub fn transfer(
        receiver: PublicKey,
        sender: &KeyPair,
        amount: f64,
    ) -> Result<Self, TransactionError> {
        Self::new(
            receiver,
            sender.public_key.clone(),
            amount,
            sender.private_key(),
        )
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn receiver_public_key(&self) -> &PublicKey {
        &self.receiver_public_key
    }

    pub fn owner_public_key(&self) -> &PublicKey {
        &self.owner_public_key
    }

    pub fn digest(&self) -> Hash {
        self.digest
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Check the stored digest against the amount and receiver.
    pub fn verify_digest(&self) -> bool {
        transaction_digest(self.amount, &self.receiver_public_key) == self.digest
    }

    /// Verify the owner's signature over the digest.
    ///
    /// Unlike [`validate_signature`](Self::validate_signature), an owner key
    /// that cannot be imported is reported as an error.
    pub fn try_validate_signature(&self) -> Result<bool, CryptoError> {
        self.owner_public_key
            .verify(self.digest.to_hex().as_bytes(), &self.signature)
    }

    /// Verify the owner's signature over the digest.
    ///
    /// Returns `false` for any signature that does not verify, including one
    /// paired with damaged key material.
    pub fn validate_signature(&self) -> bool {
        match self.try_validate_signature() {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!(digest = %self.digest, error = %e, "owner key rejected");
                false
            }
        }
    }
}

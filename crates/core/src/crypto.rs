//! ECDSA cryptographic primitives for signing and verification.
//!
//! Keys live on the NIST P-256 curve. Public keys travel as DER
//! SubjectPublicKeyInfo, private keys as DER PKCS#8. Both are kept as
//! opaque byte strings and only parsed when a signature is produced or
//! checked.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("verification failed: {0}")]
    Verification(String),
    #[error("invalid base64 encoding")]
    InvalidEncoding,
}

mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text.trim())
        .map_err(|_| CryptoError::InvalidEncoding)
}

/// A DER-encoded SubjectPublicKeyInfo.
///
/// The bytes are not parsed on construction; a damaged key is only detected
/// when it is used to verify.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "base64_serde")] Vec<u8>);

impl PublicKey {
    /// Wrap encoded SPKI bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Standard base64 rendering of the encoded key.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Parse from standard base64.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        decode_base64(text).map(Self)
    }

    fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_public_key_der(&self.0).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Verify a signature over `message`.
    ///
    /// A well-formed key with a non-matching signature yields `Ok(false)`;
    /// only key material that cannot be imported is an error.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<bool, CryptoError> {
        let key = self.verifying_key()?;
        let sig = match EcdsaSignature::from_slice(&signature.0) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        Ok(key.verify(message, &sig).is_ok())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = self.0.len().saturating_sub(8);
        write!(f, "PublicKey(..{})", hex::encode(&self.0[tail..]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// A DER-encoded PKCS#8 private key.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Wrap encoded PKCS#8 bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        decode_base64(text).map(Self)
    }

    fn signing_key(&self) -> Result<SigningKey, CryptoError> {
        SigningKey::from_pkcs8_der(&self.0).map_err(|_| CryptoError::InvalidPrivateKey)
    }

    /// Sign `message` with ECDSA over SHA-256.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        let key = self.signing_key()?;
        let sig: EcdsaSignature = key
            .try_sign(message)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&sig.to_bytes());
        Ok(Signature(bytes))
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        let key = self.signing_key()?;
        let der = key
            .verifying_key()
            .to_public_key_der()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(PublicKey(der.as_bytes().to_vec()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A fixed-width ECDSA signature (`r || s`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        base64_serde::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = base64_serde::deserialize(deserializer)?;
        if bytes.len() != 64 {
            return Err(serde::de::Error::custom("signature must be 64 bytes"));
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&bytes);
        Ok(Signature(arr))
    }
}

impl Signature {
    /// Create a signature from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(self.0)[..16])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// An encoded key pair for signing and verification.
#[derive(Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    private_key: PrivateKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Result<Self, CryptoError> {
        let signing_key = SigningKey::random(&mut OsRng);
        let private_der = signing_key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_der = signing_key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            public_key: PublicKey(public_der.as_bytes().to_vec()),
            private_key: PrivateKey(private_der.as_bytes().to_vec()),
        })
    }

    /// Rebuild a key pair from a PKCS#8 private key.
    pub fn from_private_key(private_key: PrivateKey) -> Result<Self, CryptoError> {
        let public_key = private_key.public_key()?;
        Ok(Self {
            public_key,
            private_key,
        })
    }

    /// Rebuild a key pair from both encodings, checking that they match.
    pub fn from_encoded(public_key: PublicKey, private_key: PrivateKey) -> Result<Self, CryptoError> {
        public_key.verifying_key()?;
        if private_key.public_key()? != public_key {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(Self {
            public_key,
            private_key,
        })
    }

    /// Get the private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        self.private_key.sign(message)
    }

    /// Verify a signature against our public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<bool, CryptoError> {
        self.public_key.verify(message, signature)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp = KeyPair::generate().unwrap();
        assert!(!kp.public_key.as_bytes().is_empty());
        assert!(!kp.private_key().as_bytes().is_empty());
        assert_ne!(kp.public_key.as_bytes(), kp.private_key().as_bytes());
    }

    #[test]
    fn test_distinct_keypairs() {
        let kp1 = KeyPair::generate().unwrap();
        let kp2 = KeyPair::generate().unwrap();
        assert_ne!(kp1.public_key, kp2.public_key);
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate().unwrap();
        let message = b"hello world";
        let sig = kp.sign(message).unwrap();
        assert!(kp.verify(message, &sig).unwrap());
    }

    #[test]
    fn test_wrong_message_fails() {
        let kp = KeyPair::generate().unwrap();
        let sig = kp.sign(b"hello").unwrap();
        assert!(!kp.verify(b"world", &sig).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = KeyPair::generate().unwrap();
        let kp2 = KeyPair::generate().unwrap();
        let sig = kp1.sign(b"hello").unwrap();
        assert!(!kp2.verify(b"hello", &sig).unwrap());
    }

    #[test]
    fn test_malformed_public_key_is_an_error() {
        let kp = KeyPair::generate().unwrap();
        let sig = kp.sign(b"hello").unwrap();
        let broken = PublicKey::from_bytes(vec![0x30, 0x01, 0x02]);
        assert!(matches!(
            broken.verify(b"hello", &sig),
            Err(CryptoError::InvalidPublicKey)
        ));
    }

    #[test]
    fn test_malformed_private_key_is_an_error() {
        let broken = PrivateKey::from_bytes(vec![1, 2, 3]);
        assert!(matches!(
            broken.sign(b"hello"),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_base64_roundtrip_signs_identically() {
        let kp = KeyPair::generate().unwrap();
        let public = PublicKey::from_base64(&kp.public_key.to_base64()).unwrap();
        let private = PrivateKey::from_base64(&kp.private_key().to_base64()).unwrap();
        let restored = KeyPair::from_encoded(public, private).unwrap();

        assert_eq!(restored.public_key, kp.public_key);

        let sig = restored.sign(b"payload").unwrap();
        assert!(kp.verify(b"payload", &sig).unwrap());
        let sig = kp.sign(b"payload").unwrap();
        assert!(restored.verify(b"payload", &sig).unwrap());
    }

    #[test]
    fn test_keypair_from_private_key() {
        let kp1 = KeyPair::generate().unwrap();
        let kp2 = KeyPair::from_private_key(kp1.private_key().clone()).unwrap();
        assert_eq!(kp1.public_key, kp2.public_key);
    }

    #[test]
    fn test_mismatched_encodings_rejected() {
        let kp1 = KeyPair::generate().unwrap();
        let kp2 = KeyPair::generate().unwrap();
        let result = KeyPair::from_encoded(kp1.public_key.clone(), kp2.private_key().clone());
        assert!(matches!(result, Err(CryptoError::InvalidPublicKey)));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(matches!(
            PublicKey::from_base64("not base64!!"),
            Err(CryptoError::InvalidEncoding)
        ));
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let kp = KeyPair::generate().unwrap();
        let sig = kp.sign(b"hello").unwrap();
        let json = serde_json::to_string(&sig).unwrap();
        let parsed: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, parsed);
    }
}

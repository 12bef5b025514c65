//! Signing oracle seam.
//!
//! The ledger consumes signing as a capability: blocks are proven by an
//! authority signature and transactions carry voter signatures, but the
//! engine itself never generates or stores keys. [`Signer`] abstracts
//! the authority keypair; [`verify`] is the detached check used for
//! both voter and authority signatures.
//!
//! The production implementation wraps an Ed25519 keypair supplied as
//! PEM-encoded PKCS#8 material.

use std::fmt;

use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey};
use ed25519_dalek::{
    Signature as DalekSignature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey,
};

use crate::types::{PublicKey, Signature};

/// Signing capability consumed by the block builder.
///
/// Implementations must be deterministic per message and must expose
/// the verifying key that [`verify`] will be handed by other nodes.
pub trait Signer {
    /// Signs an arbitrary message, returning a detached signature.
    fn sign(&self, message: &[u8]) -> Signature;

    /// Returns the public key matching this signer's private key.
    fn public_key(&self) -> PublicKey;
}

/// Verifies a detached signature over `message` under `public_key`.
///
/// Returns `false` for malformed keys or signatures as well as for
/// honest verification failures; callers only ever branch on the
/// boolean outcome (reject vs admit), never on the failure mode.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let key_bytes: [u8; 32] = match public_key.as_bytes().try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig) = DalekSignature::from_slice(signature.as_bytes()) else {
        return false;
    };
    key.verify(message, &sig).is_ok()
}

/// Errors raised while loading externally supplied key material.
#[derive(Debug)]
pub enum KeyError {
    /// The PEM document could not be parsed as an Ed25519 key.
    Pem(String),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Pem(msg) => write!(f, "invalid PEM key material: {msg}"),
        }
    }
}

impl std::error::Error for KeyError {}

/// Ed25519 authority signer backed by an in-memory keypair.
pub struct Ed25519Authority {
    key: SigningKey,
}

impl Ed25519Authority {
    /// Loads the authority keypair from PEM-encoded PKCS#8 material.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let key = SigningKey::from_pkcs8_pem(pem).map_err(|e| KeyError::Pem(e.to_string()))?;
        Ok(Self { key })
    }

    /// Builds a signer from a raw 32-byte seed. Intended for tests and
    /// local simulations where deterministic keys are convenient.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }
}

impl Signer for Ed25519Authority {
    fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.key.sign(message).to_bytes().to_vec())
    }

    fn public_key(&self) -> PublicKey {
        PublicKey(self.key.verifying_key().to_bytes().to_vec())
    }
}

/// Loads a standalone verifying key from PEM-encoded SPKI material.
///
/// Non-proposing nodes only need the authority's public half to check
/// block proofs.
pub fn public_key_from_pem(pem: &str) -> Result<PublicKey, KeyError> {
    let key = VerifyingKey::from_public_key_pem(pem).map_err(|e| KeyError::Pem(e.to_string()))?;
    Ok(PublicKey(key.to_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrip() {
        let authority = Ed25519Authority::from_seed([9; 32]);
        let msg = b"block header bytes";
        let sig = authority.sign(msg);

        assert!(verify(&authority.public_key(), msg, &sig));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let authority = Ed25519Authority::from_seed([9; 32]);
        let sig = authority.sign(b"vote to a");

        assert!(!verify(&authority.public_key(), b"vote to da", &sig));
    }

    #[test]
    fn verify_rejects_malformed_key_and_signature() {
        let authority = Ed25519Authority::from_seed([9; 32]);
        let sig = authority.sign(b"msg");

        let short_key = PublicKey(vec![1, 2, 3]);
        assert!(!verify(&short_key, b"msg", &sig));

        let short_sig = Signature(vec![0; 7]);
        assert!(!verify(&authority.public_key(), b"msg", &short_sig));
    }
}

//! Relay identity key material.
//!
//! Every relay signs its frozen entries with an ed25519 keypair; the public
//! half is the relay's [`SignerId`]. Users carry an identity keypair of the
//! same scheme for the identity half of a dual signature.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::SignerId;

/// An ed25519 keypair used to sign frozen entries and identity payloads.
pub struct RelayKeypair {
    signing: SigningKey,
}

impl RelayKeypair {
    /// Load a keypair from its 32-byte secret seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The public identity of this keypair.
    #[must_use]
    pub fn signer_id(&self) -> SignerId {
        SignerId::from_pubkey(self.signing.verifying_key().to_bytes())
    }

    /// Sign a message, returning the 64-byte signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_vec()
    }
}

impl std::fmt::Debug for RelayKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret material stays out of logs.
        f.debug_struct("RelayKeypair")
            .field("signer", &self.signer_id())
            .finish_non_exhaustive()
    }
}

/// Verify an ed25519 signature against a signer's public key.
///
/// Malformed keys or signatures verify as `false` rather than erroring —
/// verification fails closed.
#[must_use]
pub fn verify_signature(signer: &SignerId, message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &sig).is_ok()
}

#[cfg(any(test, feature = "test-helpers"))]
impl RelayKeypair {
    /// Generate a fresh random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = RelayKeypair::from_seed([7u8; 32]);
        let sig = kp.sign(b"hello");
        assert!(verify_signature(&kp.signer_id(), b"hello", &sig));
    }

    #[test]
    fn tampered_message_fails() {
        let kp = RelayKeypair::from_seed([7u8; 32]);
        let sig = kp.sign(b"hello");
        assert!(!verify_signature(&kp.signer_id(), b"hellp", &sig));
    }

    #[test]
    fn wrong_signer_fails() {
        let kp = RelayKeypair::from_seed([7u8; 32]);
        let other = RelayKeypair::from_seed([8u8; 32]);
        let sig = kp.sign(b"hello");
        assert!(!verify_signature(&other.signer_id(), b"hello", &sig));
    }

    #[test]
    fn malformed_signature_fails_closed() {
        let kp = RelayKeypair::from_seed([7u8; 32]);
        assert!(!verify_signature(&kp.signer_id(), b"hello", &[0u8; 3]));
    }

    #[test]
    fn seed_is_deterministic() {
        let a = RelayKeypair::from_seed([1u8; 32]);
        let b = RelayKeypair::from_seed([1u8; 32]);
        assert_eq!(a.signer_id(), b.signer_id());
    }

    #[test]
    fn debug_hides_secret() {
        let kp = RelayKeypair::from_seed([7u8; 32]);
        let dbg = format!("{kp:?}");
        assert!(dbg.contains("signer"));
        assert!(!dbg.contains("SigningKey"));
    }
}

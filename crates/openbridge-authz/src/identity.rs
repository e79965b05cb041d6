//! Self-authenticating identity signatures.
//!
//! An identity signature wraps the signed payload: verifying a
//! [`SignedPayload`] returns the original payload, so the verifier never has
//! to trust the transport's copy. The signature covers the payload's
//! canonical bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use openbridge_types::{
    BridgeError, RelayKeypair, Result, SignerId, canonical_bytes, verify_signature,
};

/// A payload together with the ed25519 signature binding it to a signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedPayload {
    /// The signed payload.
    pub payload: Value,
    /// Ed25519 signature over `canonical_bytes(payload)`.
    pub signature: Vec<u8>,
    /// The identity key that signed.
    pub signer: SignerId,
}

impl SignedPayload {
    /// Sign a payload with an identity keypair.
    pub fn sign<T: Serialize>(keypair: &RelayKeypair, payload: &T) -> Result<Self> {
        let bytes = canonical_bytes(payload)?;
        Ok(Self {
            payload: serde_json::from_slice(&bytes)?,
            signature: keypair.sign(&bytes),
            signer: keypair.signer_id(),
        })
    }

    /// Verify the signature and recover the payload.
    ///
    /// # Errors
    /// Returns `IdentitySignatureInvalid` when the signature does not verify
    /// against the embedded signer key.
    pub fn verify(&self) -> Result<&Value> {
        let bytes = canonical_bytes(&self.payload)?;
        if verify_signature(&self.signer, &bytes, &self.signature) {
            Ok(&self.payload)
        } else {
            Err(BridgeError::IdentitySignatureInvalid)
        }
    }
}

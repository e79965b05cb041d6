//! The frozen-entry model: immutable, signed, content-addressed records.
//!
//! A [`FrozenEntry`] is never mutated or deleted once written — corrections
//! are new entries. The only mutable record in the system is the
//! [`IndexPointer`], which maps a logical key to the hash of its latest
//! frozen entry.
//!
//! ## Canonical encoding
//!
//! Everything that is hashed, signed, or compared for equality goes through
//! [`canonical_bytes`]: JSON with lexicographically ordered object keys.
//! This removes any ambiguity about serialization order — two payloads are
//! equal iff their canonical bytes are equal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{EntryHash, Result, SignerId};

/// Serialize a value to its canonical byte form.
///
/// The value is first converted to a `serde_json::Value`, whose object maps
/// are ordered (`BTreeMap`-backed), then serialized. Struct field order,
/// map insertion order, and nesting depth all wash out.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let normalized = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&normalized)?)
}

/// SHA-256 over the canonical byte form: the entry's content address.
pub fn content_hash<T: Serialize>(value: &T) -> Result<EntryHash> {
    let bytes = canonical_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&digest);
    Ok(EntryHash::from_bytes(hash))
}

/// An immutable, signed, content-addressed ledger record.
///
/// Identified by `content_hash = sha256(canonical(data))` and stored under
/// `frozen-<ns>/<hash>`. The ed25519 signature covers the content hash, so
/// any tampering with `data` invalidates both the address and the signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenEntry {
    /// The entry payload (a balance snapshot, transfer record, ...).
    pub data: Value,
    /// Ed25519 signature over `content_hash` from the writing relay.
    pub signature: Vec<u8>,
    /// SHA-256 of the canonical payload bytes.
    pub content_hash: EntryHash,
    /// The relay key that produced the signature.
    pub signer: SignerId,
}

impl FrozenEntry {
    /// The bytes the relay signed: the content hash.
    #[must_use]
    pub fn signing_bytes(&self) -> &[u8; 32] {
        self.content_hash.as_bytes()
    }

    /// Recompute the content hash from `data` and compare to the stored one.
    pub fn hash_matches(&self) -> Result<bool> {
        Ok(content_hash(&self.data)? == self.content_hash)
    }

    /// Deserialize the payload into a typed record.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// The mutable pointer mapping a logical key to its latest frozen entry.
///
/// Always overwritten, never merged — last writer wins. This is the sole
/// source of "current" state for a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPointer {
    /// Hash of the newest frozen entry for this key.
    pub latest_hash: EntryHash,
    /// The relay that wrote that entry.
    pub signer: SignerId,
    /// When the pointer was overwritten.
    pub updated_at: DateTime<Utc>,
}

//! The frozen-entry store: append-only, signed, content-addressed records.
//!
//! `create` writes an immutable [`FrozenEntry`] under `frozen-<ns>/<hash>`
//! and then overwrites the mutable pointer `<ns>-index/<key>`. Reads verify
//! before trusting: the recomputed content hash must match, the ed25519
//! signature must verify, and the signer must belong to the supplied trusted
//! set. A missing trusted set fails closed. Callers treat an unverified
//! entry exactly like an absent one.
//!
//! Because the substrate offers no read-after-write guarantee, `read_latest`
//! may observe a stale index pointer — a known, expected condition the
//! ledger compensates for, not an error.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use openbridge_types::constants::{FROZEN_PREFIX, INDEX_SUFFIX};
use openbridge_types::{
    EntryHash, FrozenEntry, IndexPointer, RelayKeypair, Result, SignerId, canonical_bytes,
    content_hash, verify_signature,
};

use crate::replicated::ReplicatedStore;

/// The set of signer keys whose entries are trusted.
///
/// [`TrustedSigners::None`] verifies nothing — absence of a trust anchor is
/// treated as "trust nobody", never "trust everybody".
#[derive(Debug, Clone)]
pub enum TrustedSigners {
    /// No trust anchor supplied; verification fails closed.
    None,
    /// A single trusted key (typically this relay's own).
    One(SignerId),
    /// The full trusted relay set.
    Set(HashSet<SignerId>),
}

impl TrustedSigners {
    #[must_use]
    pub fn from_vec(signers: Vec<SignerId>) -> Self {
        Self::Set(signers.into_iter().collect())
    }

    #[must_use]
    pub fn contains(&self, signer: &SignerId) -> bool {
        match self {
            Self::None => false,
            Self::One(one) => one == signer,
            Self::Set(set) => set.contains(signer),
        }
    }
}

/// Outcome of reading a frozen entry.
#[derive(Debug, Clone)]
pub struct EntryRead {
    /// The raw entry as stored.
    pub entry: FrozenEntry,
    /// Whether the entry passed full verification.
    pub verified: bool,
    /// Why verification failed, when it did.
    pub reason: Option<String>,
}

impl EntryRead {
    /// The entry, but only if verified. Unverified data must never
    /// influence balance.
    #[must_use]
    pub fn verified_entry(self) -> Option<FrozenEntry> {
        if self.verified { Some(self.entry) } else { None }
    }
}

/// Content-addressed entry storage over a [`ReplicatedStore`].
#[derive(Clone)]
pub struct FrozenEntryStore<S> {
    store: S,
}

impl<S: ReplicatedStore> FrozenEntryStore<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying replicated store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn entry_path(namespace: &str, hash: &EntryHash) -> String {
        format!("{FROZEN_PREFIX}{namespace}/{hash}")
    }

    fn index_path(namespace: &str, index_key: &str) -> String {
        format!("{namespace}{INDEX_SUFFIX}/{index_key}")
    }

    /// Create a frozen entry: canonicalize, hash, sign, write the entry,
    /// then overwrite the index pointer. Returns the content hash.
    pub async fn create<T: Serialize>(
        &self,
        data: &T,
        keypair: &RelayKeypair,
        namespace: &str,
        index_key: &str,
    ) -> Result<EntryHash> {
        // Normalizing through canonical bytes fixes the hash regardless of
        // struct field order.
        let value: serde_json::Value = serde_json::from_slice(&canonical_bytes(data)?)?;
        let hash = content_hash(&value)?;
        let entry = FrozenEntry {
            signature: keypair.sign(hash.as_bytes()),
            content_hash: hash,
            signer: keypair.signer_id(),
            data: value,
        };

        self.store
            .put(&Self::entry_path(namespace, &hash), serde_json::to_value(&entry)?)
            .await?;

        let pointer = IndexPointer {
            latest_hash: hash,
            signer: keypair.signer_id(),
            updated_at: Utc::now(),
        };
        self.store
            .put(
                &Self::index_path(namespace, index_key),
                serde_json::to_value(&pointer)?,
            )
            .await?;

        Ok(hash)
    }

    /// Read and verify an entry by its content hash.
    pub async fn read_by_hash(
        &self,
        namespace: &str,
        hash: &EntryHash,
        trusted: &TrustedSigners,
    ) -> Result<Option<EntryRead>> {
        let Some(raw) = self.store.get(&Self::entry_path(namespace, hash)).await? else {
            return Ok(None);
        };
        let entry: FrozenEntry = serde_json::from_value(raw)?;
        Ok(Some(Self::verify(entry, hash, trusted)))
    }

    /// Read and verify the latest entry for an index key.
    ///
    /// A dangling pointer (entry not yet propagated) reads as `None`.
    pub async fn read_latest(
        &self,
        namespace: &str,
        index_key: &str,
        trusted: &TrustedSigners,
    ) -> Result<Option<EntryRead>> {
        let Some(raw) = self.store.get(&Self::index_path(namespace, index_key)).await? else {
            return Ok(None);
        };
        let pointer: IndexPointer = serde_json::from_value(raw)?;

        let read = self
            .read_by_hash(namespace, &pointer.latest_hash, trusted)
            .await?;
        if read.is_none() {
            debug!(
                namespace,
                index_key,
                hash = %pointer.latest_hash.short(),
                "index pointer references an entry that has not propagated yet"
            );
        }
        Ok(read)
    }

    /// Read and verify every frozen entry in a namespace.
    ///
    /// Entries whose store key is not a parsable hash, or whose payload is
    /// malformed, are skipped with a log line — a corrupt record must not
    /// prevent enumeration of the rest.
    pub async fn list_entries(
        &self,
        namespace: &str,
        trusted: &TrustedSigners,
    ) -> Result<Vec<EntryRead>> {
        let prefix = format!("{FROZEN_PREFIX}{namespace}");
        let cut = format!("{prefix}/");
        let rows = self.store.list(&prefix).await?;

        let mut reads = Vec::with_capacity(rows.len());
        for (path, raw) in rows {
            let Some(hash) = path
                .strip_prefix(&cut)
                .and_then(|s| EntryHash::parse(s).ok())
            else {
                debug!(path, "skipping entry with unparsable hash key");
                continue;
            };
            match serde_json::from_value::<FrozenEntry>(raw) {
                Ok(entry) => reads.push(Self::verify(entry, &hash, trusted)),
                Err(e) => debug!(path, error = %e, "skipping malformed frozen entry"),
            }
        }
        Ok(reads)
    }

    /// Enumerate every index key in a namespace.
    pub async fn list_index_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let prefix = format!("{namespace}{INDEX_SUFFIX}");
        let rows = self.store.list(&prefix).await?;
        let cut = format!("{prefix}/");
        Ok(rows
            .into_iter()
            .filter_map(|(path, _)| path.strip_prefix(&cut).map(str::to_string))
            .collect())
    }

    fn verify(entry: FrozenEntry, expected_hash: &EntryHash, trusted: &TrustedSigners) -> EntryRead {
        let fail = |entry: FrozenEntry, reason: String| EntryRead {
            entry,
            verified: false,
            reason: Some(reason),
        };

        if entry.content_hash != *expected_hash {
            return fail(entry, "stored hash does not match requested hash".into());
        }
        match entry.hash_matches() {
            Ok(true) => {}
            Ok(false) => return fail(entry, "content hash does not match payload".into()),
            Err(e) => return fail(entry, format!("payload not canonicalizable: {e}")),
        }
        if matches!(trusted, TrustedSigners::None) {
            return fail(entry, "no trusted signers supplied".into());
        }
        if !trusted.contains(&entry.signer) {
            let signer = entry.signer;
            return fail(entry, format!("signer {signer} not in trusted set"));
        }
        if !verify_signature(&entry.signer, entry.content_hash.as_bytes(), &entry.signature) {
            return fail(entry, "signature verification failed".into());
        }

        EntryRead {
            entry,
            verified: true,
            reason: None,
        }
    }
}

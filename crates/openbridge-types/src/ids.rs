//! Identifiers used throughout OpenBridge.
//!
//! `EthAddress` and `EntryHash` carry custom serde implementations that
//! read and write hex strings — their hex forms double as store keys, so
//! the serialized shape must match the key layout exactly. `SignerId` is
//! the raw ed25519 public key, mirrored as hex on the wire. `BatchId`
//! uses UUIDv7 for time-ordered lexicographic sorting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{BridgeError, Result};

// ---------------------------------------------------------------------------
// EthAddress
// ---------------------------------------------------------------------------

/// An Ethereum account address (20 bytes).
///
/// The canonical textual form is lowercase `0x`-prefixed hex; that string is
/// also the normalized balance index key, so parsing accepts any case but
/// display and serialization always emit lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct EthAddress(pub [u8; 20]);

impl EthAddress {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string, with or without the `0x` prefix.
    ///
    /// # Errors
    /// Returns `Configuration` if the string is not 20 bytes of hex.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(trimmed)
            .map_err(|e| BridgeError::Configuration(format!("invalid address hex: {e}")))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| BridgeError::Configuration(format!("address must be 20 bytes: {s}")))?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The normalized lowercase form used as the balance index key.
    #[must_use]
    pub fn index_key(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    #[must_use]
    pub fn short(&self) -> String {
        format!("0x{}..", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for EthAddress {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.index_key())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// EntryHash
// ---------------------------------------------------------------------------

/// SHA-256 content hash of a frozen entry's canonical payload.
///
/// The hex form is the entry's store key under `frozen-<ns>/<hash>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct EntryHash(pub [u8; 32]);

impl EntryHash {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a 64-character hex string.
    pub fn parse(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| BridgeError::Serialization(format!("invalid entry hash hex: {e}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| BridgeError::Serialization(format!("entry hash must be 32 bytes: {s}")))?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for EntryHash {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for EntryHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EntryHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SignerId
// ---------------------------------------------------------------------------

/// Identity of a relay: the raw ed25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct SignerId(pub [u8; 32]);

impl SignerId {
    #[must_use]
    pub fn from_pubkey(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| BridgeError::Serialization(format!("invalid signer hex: {e}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| BridgeError::Serialization(format!("signer id must be 32 bytes: {s}")))?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay:{}", hex::encode(&self.0[..8]))
    }
}

impl Serialize for SignerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SignerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// Globally unique withdrawal-batch identifier. Uses UUIDv7 for
/// time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
impl EthAddress {
    /// Deterministic dummy address for unit tests.
    #[must_use]
    pub fn dummy(tag: u8) -> Self {
        Self([tag; 20])
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl EntryHash {
    /// Deterministic dummy hash for unit tests.
    #[must_use]
    pub fn dummy(tag: u8) -> Self {
        Self([tag; 32])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

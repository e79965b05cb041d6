//! Reconciliation support records: the advisory per-user lock, processed
//! deposit markers, and persisted nonce records.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EthAddress, SignerId};

/// Advisory, TTL-bounded reconciliation lock. One per user.
///
/// Owned by `(relay, user)`; a relay may only release a lock it owns, and
/// an expired lock is treated as free by everyone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationLock {
    /// The relay holding the lock.
    pub relay: SignerId,
    /// The user being reconciled.
    pub user: EthAddress,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
    /// When the lock auto-expires.
    pub expires_at: DateTime<Utc>,
}

impl ReconciliationLock {
    /// Take a lock for `ttl_secs` starting now.
    #[must_use]
    pub fn acquire(relay: SignerId, user: EthAddress, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            relay,
            user,
            acquired_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        }
    }

    /// Returns `true` once the TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Whether `relay` owns this lock.
    #[must_use]
    pub fn is_owned_by(&self, relay: &SignerId) -> bool {
        self.relay == *relay
    }
}

/// Idempotency marker for a credited on-chain deposit.
///
/// Existence of the marker (keyed `<tx_hash>:<user>:<amount>`) means the
/// deposit has been credited; it must never be credited again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedDeposit {
    /// The on-chain deposit transaction.
    pub tx_hash: String,
    /// The depositing user.
    pub user: EthAddress,
    /// Deposited amount.
    pub amount: Decimal,
    /// When the relay credited it.
    pub credited_at: DateTime<Utc>,
}

impl ProcessedDeposit {
    /// The unique marker key: `<tx_hash>:<user>:<amount>`.
    #[must_use]
    pub fn key(&self) -> String {
        Self::key_for(&self.tx_hash, &self.user, self.amount)
    }

    /// Build the marker key for a deposit event.
    #[must_use]
    pub fn key_for(tx_hash: &str, user: &EthAddress, amount: Decimal) -> String {
        format!("{}:{}:{}", tx_hash, user.index_key(), amount)
    }
}

/// The persisted last-used withdrawal nonce for a user.
///
/// Loaded into memory at startup, updated after every accepted withdrawal.
/// Monotonically increasing, never reused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NonceRecord {
    /// The highest nonce accepted so far.
    pub last_nonce: u64,
    /// When it was last advanced.
    pub updated_at: DateTime<Utc>,
}

impl NonceRecord {
    #[must_use]
    pub fn new(last_nonce: u64) -> Self {
        Self {
            last_nonce,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lock_not_expired() {
        let lock = ReconciliationLock::acquire(SignerId([1u8; 32]), EthAddress::dummy(1), 60);
        assert!(!lock.is_expired());
        assert!(lock.is_owned_by(&SignerId([1u8; 32])));
        assert!(!lock.is_owned_by(&SignerId([2u8; 32])));
    }

    #[test]
    fn past_lock_expired() {
        let mut lock = ReconciliationLock::acquire(SignerId([1u8; 32]), EthAddress::dummy(1), 60);
        lock.expires_at = Utc::now() - Duration::seconds(1);
        assert!(lock.is_expired());
    }

    #[test]
    fn deposit_key_shape() {
        let dep = ProcessedDeposit {
            tx_hash: "0xfeed".into(),
            user: EthAddress::dummy(1),
            amount: Decimal::new(100, 0),
            credited_at: Utc::now(),
        };
        assert_eq!(
            dep.key(),
            format!("0xfeed:{}:100", EthAddress::dummy(1).index_key())
        );
    }

    #[test]
    fn deposit_keys_distinguish_amounts() {
        let user = EthAddress::dummy(1);
        let a = ProcessedDeposit::key_for("0x01", &user, Decimal::new(100, 0));
        let b = ProcessedDeposit::key_for("0x01", &user, Decimal::new(101, 0));
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_record_serde_roundtrip() {
        let rec = NonceRecord::new(41);
        let json = serde_json::to_string(&rec).unwrap();
        let back: NonceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec.last_nonce, back.last_nonce);
    }
}

//! Withdrawal lifecycle types: pending entries, the emergency queue, and
//! settlement batches.
//!
//! A [`PendingWithdrawal`] exists only after a successful debit — its
//! `debit_hash` references the frozen entry proving the balance was actually
//! reduced. Lifecycle: *queued* → consumed into exactly one
//! [`WithdrawalBatch`] → deleted (idempotently) once the batch settles.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{BatchId, EntryHash, EthAddress};

/// A withdrawal that has been authorized and debited but not yet settled.
///
/// Keyed uniquely by `user:nonce` in the pending set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingWithdrawal {
    /// The withdrawing user.
    pub user: EthAddress,
    /// Amount being withdrawn.
    pub amount: Decimal,
    /// The user's withdrawal nonce (strictly monotonic per user).
    pub nonce: u64,
    /// When the withdrawal was accepted.
    pub timestamp: DateTime<Utc>,
    /// Hash of the frozen entry proving the backing debit.
    pub debit_hash: EntryHash,
}

impl PendingWithdrawal {
    /// The unique pending-set key: `<user>:<nonce>`.
    #[must_use]
    pub fn key(&self) -> String {
        Self::key_for(&self.user, self.nonce)
    }

    /// Build the pending-set key for a (user, nonce) pair.
    #[must_use]
    pub fn key_for(user: &EthAddress, nonce: u64) -> String {
        format!("{}:{}", user.index_key(), nonce)
    }
}

/// An emergency withdrawal queued outside the normal authorization flow,
/// keyed by the hash of the balance entry it escalates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForceWithdrawal {
    /// The withdrawing user.
    pub user: EthAddress,
    /// Amount being withdrawn.
    pub amount: Decimal,
    /// The balance entry this escalation points at.
    pub entry_hash: EntryHash,
    /// When the escalation was filed.
    pub requested_at: DateTime<Utc>,
}

/// A set of withdrawals committed on-chain via a single root commitment.
///
/// Immutable once persisted. `root` is the value submitted to the bridge
/// contract; `block_number` and `tx_hash` are filled in at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalBatch {
    /// Globally unique batch identifier.
    pub batch_id: BatchId,
    /// SHA-256 commitment over the ordered withdrawal set.
    pub root: [u8; 32],
    /// The withdrawals this batch settles, deterministically ordered.
    pub withdrawals: Vec<PendingWithdrawal>,
    /// When the batch was assembled.
    pub created_at: DateTime<Utc>,
    /// Block in which the batch settled, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Settlement transaction hash, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl WithdrawalBatch {
    /// Assemble a batch: sort the withdrawals deterministically, compute the
    /// root commitment.
    #[must_use]
    pub fn assemble(mut withdrawals: Vec<PendingWithdrawal>) -> Self {
        withdrawals.sort_by(|a, b| a.user.cmp(&b.user).then(a.nonce.cmp(&b.nonce)));
        let root = Self::compute_root(&withdrawals);
        Self {
            batch_id: BatchId::new(),
            root,
            withdrawals,
            created_at: Utc::now(),
            block_number: None,
            tx_hash: None,
        }
    }

    /// Compute the SHA-256 root over an ordered withdrawal set.
    ///
    /// Commits to the count and, per withdrawal: user, amount, nonce, and
    /// the backing debit hash.
    #[must_use]
    pub fn compute_root(withdrawals: &[PendingWithdrawal]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"openbridge:batch:v1:");
        hasher.update((withdrawals.len() as u64).to_le_bytes());
        for wd in withdrawals {
            hasher.update(wd.user.as_bytes());
            hasher.update(wd.amount.to_string().as_bytes());
            hasher.update(wd.nonce.to_le_bytes());
            hasher.update(wd.debit_hash.as_bytes());
        }
        let digest = hasher.finalize();
        let mut root = [0u8; 32];
        root.copy_from_slice(&digest);
        root
    }

    /// Recompute the root and compare against the stored commitment.
    #[must_use]
    pub fn verify_root(&self) -> bool {
        Self::compute_root(&self.withdrawals) == self.root
    }

    /// Total amount this batch settles.
    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        self.withdrawals.iter().map(|wd| wd.amount).sum()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl PendingWithdrawal {
    /// Dummy withdrawal for unit tests. The debit hash is fabricated.
    #[must_use]
    pub fn dummy(user: EthAddress, amount: Decimal, nonce: u64) -> Self {
        Self {
            user,
            amount,
            nonce,
            timestamp: Utc::now(),
            debit_hash: EntryHash::dummy(0xDD),
        }
    }
}

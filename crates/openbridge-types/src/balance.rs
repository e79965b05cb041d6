//! Balance snapshot payloads for the OpenBridge ledger.
//!
//! A snapshot always carries the user's **full current balance**, never a
//! delta — the current balance is the `balance` field of the latest verified
//! entry, and is never derived by summing history. Amounts serialize as
//! strings (`rust_decimal` with `serde-with-str`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EntryHash, EthAddress, Result, SignerId};

/// Payload kind tag for balance snapshots.
pub const BALANCE_KIND: &str = "bridge-balance";

/// The `data` payload of a balance frozen entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Always [`BALANCE_KIND`].
    pub kind: String,
    /// The full current balance after this mutation.
    pub balance: Decimal,
    /// The user this balance belongs to.
    pub ethereum_address: EthAddress,
    /// When the snapshot was written.
    pub updated_at: DateTime<Utc>,
    /// The relay key that wrote the snapshot, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_key: Option<SignerId>,
    /// Amount removed, when this snapshot records a debit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debit: Option<Decimal>,
    /// The withdrawal nonce backing a debit, when one was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawal_nonce: Option<u64>,
    /// Hash of the transfer record, when this snapshot is a transfer leg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_hash: Option<EntryHash>,
    /// Set when the snapshot was written by the reconciliation engine.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reconciliation: bool,
}

impl BalanceSnapshot {
    /// A plain snapshot (credit or initial balance).
    #[must_use]
    pub fn new(user: EthAddress, balance: Decimal, relay_key: SignerId) -> Self {
        Self {
            kind: BALANCE_KIND.to_string(),
            balance,
            ethereum_address: user,
            updated_at: Utc::now(),
            relay_key: Some(relay_key),
            debit: None,
            withdrawal_nonce: None,
            transfer_hash: None,
            reconciliation: false,
        }
    }

    /// A snapshot recording a debit of `debit` (balance already reduced).
    #[must_use]
    pub fn debited(
        user: EthAddress,
        balance: Decimal,
        debit: Decimal,
        withdrawal_nonce: Option<u64>,
        relay_key: SignerId,
    ) -> Self {
        Self {
            debit: Some(debit),
            withdrawal_nonce,
            ..Self::new(user, balance, relay_key)
        }
    }

    /// A corrective snapshot written by the reconciliation engine.
    #[must_use]
    pub fn reconciled(user: EthAddress, balance: Decimal, relay_key: SignerId) -> Self {
        Self {
            reconciliation: true,
            ..Self::new(user, balance, relay_key)
        }
    }

    /// Mark this snapshot as one leg of a transfer.
    #[must_use]
    pub fn with_transfer(mut self, transfer_hash: EntryHash) -> Self {
        self.transfer_hash = Some(transfer_hash);
        self
    }

    /// Whether a decoded payload is actually a balance snapshot.
    #[must_use]
    pub fn is_balance_kind(&self) -> bool {
        self.kind == BALANCE_KIND
    }

    /// Serialize into the frozen-entry payload form.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

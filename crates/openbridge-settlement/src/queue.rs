//! The pending-withdrawal queue and the emergency force-withdrawal queue.
//!
//! A withdrawal enters the queue only after a successful debit; the
//! `debit_hash` it carries is re-verified before the withdrawal is allowed
//! into a batch. That re-verification is the control preventing a forged or
//! stale queue entry from draining funds: the frozen entry must verify
//! against the trusted relay set, be a balance snapshot, and match the
//! withdrawal's user, amount, and (when present) nonce.

use tracing::warn;

use openbridge_store::{FrozenEntryStore, ReplicatedStore, TrustedSigners};
use openbridge_types::constants::{FORCE_WITHDRAWALS_PATH, PENDING_WITHDRAWALS_PATH};
use openbridge_types::{
    BalanceSnapshot, BridgeConfig, BridgeError, EntryHash, ForceWithdrawal, PendingWithdrawal,
    Result,
};

/// Pending and force withdrawal sets over the replicated store.
pub struct WithdrawalQueue<S> {
    store: S,
    entries: FrozenEntryStore<S>,
    config: BridgeConfig,
}

impl<S: ReplicatedStore + Clone> WithdrawalQueue<S> {
    #[must_use]
    pub fn new(store: S, config: BridgeConfig) -> Self {
        Self {
            entries: FrozenEntryStore::new(store.clone()),
            store,
            config,
        }
    }

    fn pending_path(key: &str) -> String {
        format!("{PENDING_WITHDRAWALS_PATH}/{key}")
    }

    /// Queue a withdrawal. Rejects a duplicate `user:nonce` key.
    ///
    /// Must be called only after a successful debit, with the resulting
    /// entry hash attached as `debit_hash`.
    pub async fn enqueue(&self, withdrawal: &PendingWithdrawal) -> Result<()> {
        let key = withdrawal.key();
        let path = Self::pending_path(&key);
        if self.store.get(&path).await?.is_some() {
            return Err(BridgeError::WithdrawalAlreadyQueued { key });
        }
        self.store
            .put(&path, serde_json::to_value(withdrawal)?)
            .await
    }

    /// Every currently-queued withdrawal. Malformed records are skipped
    /// with a warning rather than failing the listing.
    pub async fn pending(&self) -> Result<Vec<PendingWithdrawal>> {
        let rows = self.store.list(PENDING_WITHDRAWALS_PATH).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (path, value) in rows {
            match serde_json::from_value::<PendingWithdrawal>(value) {
                Ok(wd) => out.push(wd),
                Err(e) => warn!(path, error = %e, "skipping malformed pending withdrawal"),
            }
        }
        Ok(out)
    }

    /// Re-verify a withdrawal's backing debit entry before batch inclusion.
    ///
    /// # Errors
    /// Returns `DebitBackingInvalid` naming the failed check. A withdrawal
    /// failing this must never be batched.
    pub async fn verify_debit_backing(
        &self,
        withdrawal: &PendingWithdrawal,
        trusted: &TrustedSigners,
    ) -> Result<()> {
        let invalid = |reason: String| BridgeError::DebitBackingInvalid { reason };

        let read = self
            .entries
            .read_by_hash(
                &self.config.balance_namespace,
                &withdrawal.debit_hash,
                trusted,
            )
            .await?
            .ok_or_else(|| invalid(format!("debit entry {} not found", withdrawal.debit_hash)))?;

        if !read.verified {
            return Err(invalid(format!(
                "debit entry unverified: {}",
                read.reason.unwrap_or_else(|| "unknown".into())
            )));
        }

        let snapshot: BalanceSnapshot = read
            .entry
            .decode()
            .map_err(|e| invalid(format!("debit entry payload malformed: {e}")))?;

        if !snapshot.is_balance_kind() {
            return Err(invalid(format!("wrong payload kind: {}", snapshot.kind)));
        }
        if snapshot.ethereum_address != withdrawal.user {
            return Err(invalid(format!(
                "debit belongs to {}, withdrawal claims {}",
                snapshot.ethereum_address, withdrawal.user
            )));
        }
        if snapshot.debit != Some(withdrawal.amount) {
            return Err(invalid(format!(
                "debit amount {:?} does not match withdrawal amount {}",
                snapshot.debit, withdrawal.amount
            )));
        }
        if let Some(nonce) = snapshot.withdrawal_nonce {
            if nonce != withdrawal.nonce {
                return Err(invalid(format!(
                    "debit nonce {nonce} does not match withdrawal nonce {}",
                    withdrawal.nonce
                )));
            }
        }
        Ok(())
    }

    /// Remove withdrawals from the pending set. Idempotent: already-removed
    /// entries are fine, unrelated entries are untouched.
    pub async fn remove_pending(&self, withdrawals: &[PendingWithdrawal]) -> Result<()> {
        for withdrawal in withdrawals {
            self.store
                .remove(&Self::pending_path(&withdrawal.key()))
                .await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Emergency queue
    // -----------------------------------------------------------------

    /// File an emergency withdrawal, keyed by the balance entry it
    /// escalates.
    pub async fn enqueue_force(&self, withdrawal: &ForceWithdrawal) -> Result<()> {
        let path = format!("{FORCE_WITHDRAWALS_PATH}/{}", withdrawal.entry_hash);
        self.store
            .put(&path, serde_json::to_value(withdrawal)?)
            .await
    }

    /// Every queued emergency withdrawal.
    pub async fn force_pending(&self) -> Result<Vec<ForceWithdrawal>> {
        let rows = self.store.list(FORCE_WITHDRAWALS_PATH).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (path, value) in rows {
            match serde_json::from_value::<ForceWithdrawal>(value) {
                Ok(wd) => out.push(wd),
                Err(e) => warn!(path, error = %e, "skipping malformed force withdrawal"),
            }
        }
        Ok(out)
    }

    /// Remove a settled emergency withdrawal. Idempotent.
    pub async fn remove_force(&self, entry_hash: &EntryHash) -> Result<()> {
        self.store
            .remove(&format!("{FORCE_WITHDRAWALS_PATH}/{entry_hash}"))
            .await
    }
}

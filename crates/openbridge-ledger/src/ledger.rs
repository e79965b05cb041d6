//! Balance reads, credits, and debits.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{debug, warn};

use openbridge_store::{FrozenEntryStore, KeyedMutex, ReplicatedStore, TrustedSigners};
use openbridge_types::{
    BalanceSnapshot, BridgeConfig, BridgeError, EntryHash, EthAddress, RelayKeypair, Result,
};

/// Per-user balances as frozen entries under the balance namespace.
///
/// A process-local keyed mutex serializes same-user mutations within this
/// relay; cross-process races are absorbed by the credit retry loop.
pub struct BalanceLedger<S> {
    entries: FrozenEntryStore<S>,
    locks: KeyedMutex,
    config: BridgeConfig,
}

impl<S: ReplicatedStore> BalanceLedger<S> {
    #[must_use]
    pub fn new(store: S, config: BridgeConfig) -> Self {
        Self {
            entries: FrozenEntryStore::new(store),
            locks: KeyedMutex::new(),
            config,
        }
    }

    /// The underlying frozen-entry store.
    #[must_use]
    pub fn entries(&self) -> &FrozenEntryStore<S> {
        &self.entries
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The user's current balance: the latest verified snapshot's `balance`
    /// field. Absence, verification failure, and a wrong-kind payload all
    /// read as zero — fail-safe, never fail-open.
    pub async fn balance_of(&self, user: &EthAddress, trusted: &TrustedSigners) -> Result<Decimal> {
        let read = self
            .entries
            .read_latest(&self.config.balance_namespace, &user.index_key(), trusted)
            .await?;

        let Some(entry) = read.and_then(openbridge_store::EntryRead::verified_entry) else {
            return Ok(Decimal::ZERO);
        };
        let Ok(snapshot) = entry.decode::<BalanceSnapshot>() else {
            return Ok(Decimal::ZERO);
        };
        if !snapshot.is_balance_kind() {
            return Ok(Decimal::ZERO);
        }
        Ok(snapshot.balance)
    }

    /// Credit `amount` to a user.
    ///
    /// Loops up to `credit_max_attempts`: read the current balance, write a
    /// full snapshot at `current + amount`, re-read. Acceptance rule:
    /// - re-read `>=` the written value: done (a concurrent credit may have
    ///   advanced it further — acceptable);
    /// - re-read below the attempt's base value: regression from a stale or
    ///   lost write — back off `base_ms * attempt` and retry;
    /// - re-read in between: a concurrent writer is still propagating —
    ///   back off and reconverge.
    ///
    /// An attempt that observes the intended effect already applied
    /// (balance at least `initial + amount`) stops without rewriting, so the
    /// loop never double-applies its own credit. After the loop, one final
    /// check accepts if the balance grew by at least `amount` since the
    /// start; otherwise the error carries initial/final/expected balances.
    pub async fn credit(
        &self,
        user: &EthAddress,
        amount: Decimal,
        keypair: &RelayKeypair,
        trusted: &TrustedSigners,
    ) -> Result<EntryHash> {
        if amount <= Decimal::ZERO {
            return Err(BridgeError::NonPositiveAmount(amount));
        }

        let _guard = self.locks.lock(&user.index_key()).await;

        let initial = self.balance_of(user, trusted).await?;
        let target_floor = initial + amount;
        let mut last_hash: Option<EntryHash> = None;

        for attempt in 1..=self.config.credit_max_attempts {
            let current = self.balance_of(user, trusted).await?;
            if last_hash.is_some() && current >= target_floor {
                // Our write propagated between the previous verify and now.
                break;
            }

            let new_balance = current + amount;
            let snapshot = BalanceSnapshot::new(*user, new_balance, keypair.signer_id());
            let hash = self
                .entries
                .create(
                    &snapshot,
                    keypair,
                    &self.config.balance_namespace,
                    &user.index_key(),
                )
                .await?;
            last_hash = Some(hash);

            let observed = self.balance_of(user, trusted).await?;
            if observed >= new_balance {
                return Ok(hash);
            }
            if observed < current {
                warn!(
                    user = %user, attempt, %current, %observed,
                    "balance regressed after write; stale or lost write"
                );
            } else {
                debug!(
                    user = %user, attempt, %current, %observed, %new_balance,
                    "credit not yet visible; concurrent write propagating"
                );
            }
            sleep(Duration::from_millis(
                self.config.credit_backoff_base_ms * u64::from(attempt),
            ))
            .await;
        }

        let observed = self.balance_of(user, trusted).await?;
        if observed >= target_floor {
            return Ok(last_hash.expect("loop always writes at least once"));
        }
        Err(BridgeError::CreditRetriesExhausted {
            initial,
            observed,
            expected: target_floor,
        })
    }

    /// Debit `amount` from a user. Single-shot: debits must not silently
    /// re-apply, so there is no retry loop. Returns the hash of the debit
    /// entry — the proof the withdrawal queue later demands.
    pub async fn debit(
        &self,
        user: &EthAddress,
        amount: Decimal,
        keypair: &RelayKeypair,
        trusted: &TrustedSigners,
        withdrawal_nonce: Option<u64>,
    ) -> Result<EntryHash> {
        self.debit_annotated(user, amount, keypair, trusted, withdrawal_nonce, None)
            .await
    }

    pub(crate) async fn debit_annotated(
        &self,
        user: &EthAddress,
        amount: Decimal,
        keypair: &RelayKeypair,
        trusted: &TrustedSigners,
        withdrawal_nonce: Option<u64>,
        transfer_hash: Option<EntryHash>,
    ) -> Result<EntryHash> {
        if amount <= Decimal::ZERO {
            return Err(BridgeError::NonPositiveAmount(amount));
        }

        let _guard = self.locks.lock(&user.index_key()).await;

        let current = self.balance_of(user, trusted).await?;
        if current < amount {
            return Err(BridgeError::InsufficientBalance {
                needed: amount,
                available: current,
            });
        }

        let mut snapshot = BalanceSnapshot::debited(
            *user,
            current - amount,
            amount,
            withdrawal_nonce,
            keypair.signer_id(),
        );
        if let Some(hash) = transfer_hash {
            snapshot = snapshot.with_transfer(hash);
        }
        self.entries
            .create(
                &snapshot,
                keypair,
                &self.config.balance_namespace,
                &user.index_key(),
            )
            .await
    }

    /// Write a corrective full-balance snapshot, bypassing credit/debit
    /// semantics. Reconciliation only.
    pub async fn write_corrective_snapshot(
        &self,
        user: &EthAddress,
        balance: Decimal,
        keypair: &RelayKeypair,
    ) -> Result<EntryHash> {
        let _guard = self.locks.lock(&user.index_key()).await;
        let snapshot = BalanceSnapshot::reconciled(*user, balance, keypair.signer_id());
        self.entries
            .create(
                &snapshot,
                keypair,
                &self.config.balance_namespace,
                &user.index_key(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use openbridge_store::MemoryStore;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn keypair() -> RelayKeypair {
        RelayKeypair::from_seed([1u8; 32])
    }

    fn ledger(store: MemoryStore) -> BalanceLedger<MemoryStore> {
        BalanceLedger::new(store, BridgeConfig::default())
    }

    fn trusted() -> TrustedSigners {
        TrustedSigners::One(keypair().signer_id())
    }

    #[tokio::test]
    async fn unknown_user_reads_zero() {
        let ledger = ledger(MemoryStore::new());
        let balance = ledger
            .balance_of(&EthAddress::dummy(1), &trusted())
            .await
            .unwrap();
        assert_eq!(balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn credit_then_read() {
        let ledger = ledger(MemoryStore::new());
        let user = EthAddress::dummy(1);
        ledger.credit(&user, dec(100), &keypair(), &trusted()).await.unwrap();
        assert_eq!(ledger.balance_of(&user, &trusted()).await.unwrap(), dec(100));

        ledger.credit(&user, dec(50), &keypair(), &trusted()).await.unwrap();
        assert_eq!(ledger.balance_of(&user, &trusted()).await.unwrap(), dec(150));
    }

    #[tokio::test]
    async fn untrusted_writer_reads_as_zero() {
        let ledger = ledger(MemoryStore::new());
        let user = EthAddress::dummy(1);
        let stranger = RelayKeypair::from_seed([99u8; 32]);
        // Written under the stranger's own trust anchor...
        ledger
            .credit(&user, dec(100), &stranger, &TrustedSigners::One(stranger.signer_id()))
            .await
            .unwrap();
        // ...but our trust anchor rejects it: fail-safe zero.
        assert_eq!(
            ledger.balance_of(&user, &trusted()).await.unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn non_positive_amounts_rejected() {
        let ledger = ledger(MemoryStore::new());
        let user = EthAddress::dummy(1);
        assert!(matches!(
            ledger.credit(&user, dec(0), &keypair(), &trusted()).await,
            Err(BridgeError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            ledger.debit(&user, dec(-5), &keypair(), &trusted(), None).await,
            Err(BridgeError::NonPositiveAmount(_))
        ));
    }

    #[tokio::test]
    async fn debit_requires_funds() {
        let ledger = ledger(MemoryStore::new());
        let user = EthAddress::dummy(1);
        ledger.credit(&user, dec(10), &keypair(), &trusted()).await.unwrap();

        let err = ledger
            .debit(&user, dec(11), &keypair(), &trusted(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InsufficientBalance { .. }));
        // Balance unchanged after the failed debit.
        assert_eq!(ledger.balance_of(&user, &trusted()).await.unwrap(), dec(10));
    }

    #[tokio::test]
    async fn credit_then_debit_is_neutral() {
        let ledger = ledger(MemoryStore::new());
        let user = EthAddress::dummy(1);
        ledger.credit(&user, dec(100), &keypair(), &trusted()).await.unwrap();
        ledger.credit(&user, dec(40), &keypair(), &trusted()).await.unwrap();
        ledger.debit(&user, dec(40), &keypair(), &trusted(), None).await.unwrap();
        assert_eq!(ledger.balance_of(&user, &trusted()).await.unwrap(), dec(100));
    }

    #[tokio::test]
    async fn debit_writes_verifiable_proof() {
        let ledger = ledger(MemoryStore::new());
        let user = EthAddress::dummy(1);
        let kp = keypair();
        ledger.credit(&user, dec(100), &kp, &trusted()).await.unwrap();
        let hash = ledger
            .debit(&user, dec(20), &kp, &trusted(), Some(3))
            .await
            .unwrap();

        let read = ledger
            .entries()
            .read_by_hash("bridge-balances", &hash, &trusted())
            .await
            .unwrap()
            .unwrap();
        assert!(read.verified);
        let snapshot: BalanceSnapshot = read.entry.decode().unwrap();
        assert_eq!(snapshot.balance, dec(80));
        assert_eq!(snapshot.debit, Some(dec(20)));
        assert_eq!(snapshot.withdrawal_nonce, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn credit_converges_under_propagation_lag() {
        // Writes take 150ms to become visible; the retry loop re-reads and
        // reconverges instead of failing on the first stale read.
        let ledger = ledger(MemoryStore::with_lag(Duration::from_millis(150)));
        let user = EthAddress::dummy(1);
        ledger.credit(&user, dec(10), &keypair(), &trusted()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ledger.balance_of(&user, &trusted()).await.unwrap(), dec(10));
    }

    #[tokio::test(start_paused = true)]
    async fn lagged_credit_does_not_double_apply() {
        let ledger = ledger(MemoryStore::with_lag(Duration::from_millis(150)));
        let user = EthAddress::dummy(1);
        ledger.credit(&user, dec(10), &keypair(), &trusted()).await.unwrap();
        ledger.credit(&user, dec(5), &keypair(), &trusted()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ledger.balance_of(&user, &trusted()).await.unwrap(), dec(15));
    }

    #[tokio::test(start_paused = true)]
    async fn credit_exhaustion_reports_balances() {
        // Lag far exceeds the whole retry schedule, so nothing ever
        // becomes visible.
        let ledger = ledger(MemoryStore::with_lag(Duration::from_secs(600)));
        let user = EthAddress::dummy(1);

        let err = ledger
            .credit(&user, dec(10), &keypair(), &trusted())
            .await
            .unwrap_err();
        match err {
            BridgeError::CreditRetriesExhausted {
                initial,
                observed,
                expected,
            } => {
                assert_eq!(initial, Decimal::ZERO);
                assert_eq!(observed, Decimal::ZERO);
                assert_eq!(expected, dec(10));
            }
            other => panic!("expected CreditRetriesExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn concurrent_credits_converge() {
        let ledger = Arc::new(ledger(MemoryStore::new()));
        let user = EthAddress::dummy(1);

        let a = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .credit(&user, dec(30), &keypair(), &trusted())
                    .await
                    .unwrap();
            })
        };
        let b = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .credit(&user, dec(70), &keypair(), &trusted())
                    .await
                    .unwrap();
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(
            ledger.balance_of(&user, &trusted()).await.unwrap(),
            dec(100),
            "order-independent convergence"
        );
    }

    #[tokio::test]
    async fn corrective_snapshot_overrides() {
        let ledger = ledger(MemoryStore::new());
        let user = EthAddress::dummy(1);
        let kp = keypair();
        ledger.credit(&user, dec(100), &kp, &trusted()).await.unwrap();

        let hash = ledger
            .write_corrective_snapshot(&user, dec(42), &kp)
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(&user, &trusted()).await.unwrap(), dec(42));

        let read = ledger
            .entries()
            .read_by_hash("bridge-balances", &hash, &trusted())
            .await
            .unwrap()
            .unwrap();
        let snapshot: BalanceSnapshot = read.entry.decode().unwrap();
        assert!(snapshot.reconciliation);
    }
}

//! Idempotent on-chain deposit catch-up.
//!
//! For each on-chain deposit event without a `ProcessedDeposit` marker, the
//! deposit is credited and the marker written. The marker is keyed by
//! `tx_hash:user:amount`, so crediting the same deposit twice is impossible
//! relative to the marker set. The marker is written *before* the credit: a
//! crash between the two leaves a marked-but-uncredited deposit, which the
//! reconciliation engine repairs from chain history — the reverse order
//! could double-credit, which reconciliation cannot tell apart from a
//! legitimate balance.

use tracing::{info, warn};

use openbridge_ledger::BalanceLedger;
use openbridge_store::{ReplicatedStore, TrustedSigners};
use openbridge_types::constants::PROCESSED_DEPOSITS_PATH;
use openbridge_types::{EthAddress, ProcessedDeposit, RelayKeypair, Result};

use crate::chain::ChainClient;

/// Scans chain deposits and credits the ones this relay has not yet
/// processed. Safe to run repeatedly (startup catch-up, reconciliation
/// preamble, periodic sweep).
pub struct DepositSync<S, C> {
    store: S,
    chain: C,
}

impl<S: ReplicatedStore, C: ChainClient> DepositSync<S, C> {
    #[must_use]
    pub fn new(store: S, chain: C) -> Self {
        Self { store, chain }
    }

    /// The chain client this sync reads events from.
    #[must_use]
    pub fn chain(&self) -> &C {
        &self.chain
    }

    fn marker_path(key: &str) -> String {
        format!("{PROCESSED_DEPOSITS_PATH}/{key}")
    }

    /// Credit every unprocessed deposit, optionally restricted to one user.
    /// Returns the number of deposits credited.
    pub async fn sync(
        &self,
        ledger: &BalanceLedger<S>,
        keypair: &RelayKeypair,
        trusted: &TrustedSigners,
        user: Option<EthAddress>,
    ) -> Result<u32> {
        let to_block = self.chain.latest_block().await?;
        let deposits = self.chain.query_deposits(0, to_block, user).await?;

        let mut credited = 0;
        for deposit in deposits {
            let key = ProcessedDeposit::key_for(&deposit.tx_hash, &deposit.user, deposit.amount);
            let path = Self::marker_path(&key);
            if self.store.get(&path).await?.is_some() {
                continue;
            }

            let marker = ProcessedDeposit {
                tx_hash: deposit.tx_hash.clone(),
                user: deposit.user,
                amount: deposit.amount,
                credited_at: chrono::Utc::now(),
            };
            self.store.put(&path, serde_json::to_value(&marker)?).await?;

            if let Err(e) = ledger
                .credit(&deposit.user, deposit.amount, keypair, trusted)
                .await
            {
                // The marker exists but the credit failed; reconciliation
                // will repair the balance from chain history.
                warn!(
                    tx = %deposit.tx_hash, user = %deposit.user, amount = %deposit.amount,
                    error = %e, "deposit marked processed but credit failed"
                );
                continue;
            }
            info!(
                tx = %deposit.tx_hash, user = %deposit.user, amount = %deposit.amount,
                "credited missed deposit"
            );
            credited += 1;
        }
        Ok(credited)
    }
}

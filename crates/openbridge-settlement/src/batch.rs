//! Batch assembly, persistence, and settlement.
//!
//! Persistence must survive partial replication: the batch is written both
//! as a single authoritative blob and as a per-index fallback (a meta record
//! with the expected count plus one child record per withdrawal). Loading
//! prefers the blob and falls back to bounded-poll child collection — the
//! store may deliver children asynchronously after the parent.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use openbridge_store::{ReplicatedStore, TrustedSigners};
use openbridge_types::constants::BATCHES_PATH;
use openbridge_types::{
    BatchId, BridgeConfig, BridgeError, PendingWithdrawal, Result, WithdrawalBatch,
};

use crate::chain::{BatchReceipt, ChainClient};
use crate::queue::WithdrawalQueue;

/// Fallback meta record: enough to reassemble a batch from its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchMeta {
    batch_id: BatchId,
    count: usize,
    root: [u8; 32],
    created_at: DateTime<Utc>,
}

/// Assembles, persists, loads, and settles withdrawal batches.
pub struct BatchBuilder<S> {
    store: S,
    config: BridgeConfig,
}

impl<S: ReplicatedStore + Clone> BatchBuilder<S> {
    #[must_use]
    pub fn new(store: S, config: BridgeConfig) -> Self {
        Self { store, config }
    }

    fn blob_path(batch_id: BatchId) -> String {
        format!("{BATCHES_PATH}/{}", batch_id.0)
    }

    fn meta_path(batch_id: BatchId) -> String {
        format!("{BATCHES_PATH}/{}/meta", batch_id.0)
    }

    fn child_path(batch_id: BatchId, index: usize) -> String {
        format!("{BATCHES_PATH}/{}/withdrawals/{index}", batch_id.0)
    }

    /// Assemble and persist a batch from queued withdrawals.
    ///
    /// Every candidate is re-checked against its debit backing; a failing
    /// withdrawal is excluded (and logged) — it must never be batched.
    pub async fn build(
        &self,
        queue: &WithdrawalQueue<S>,
        candidates: Vec<PendingWithdrawal>,
        trusted: &TrustedSigners,
    ) -> Result<WithdrawalBatch> {
        let mut verified = Vec::with_capacity(candidates.len());
        for withdrawal in candidates {
            match queue.verify_debit_backing(&withdrawal, trusted).await {
                Ok(()) => verified.push(withdrawal),
                Err(e) => warn!(
                    key = %withdrawal.key(),
                    error = %e,
                    "excluding withdrawal from batch: debit backing failed"
                ),
            }
        }

        let batch = WithdrawalBatch::assemble(verified);
        self.persist(&batch).await?;
        info!(
            batch = %batch.batch_id,
            withdrawals = batch.withdrawals.len(),
            total = %batch.total_amount(),
            "batch assembled"
        );
        Ok(batch)
    }

    /// Write the blob and the per-index fallback representation.
    async fn persist(&self, batch: &WithdrawalBatch) -> Result<()> {
        self.store
            .put(&Self::blob_path(batch.batch_id), serde_json::to_value(batch)?)
            .await?;

        let meta = BatchMeta {
            batch_id: batch.batch_id,
            count: batch.withdrawals.len(),
            root: batch.root,
            created_at: batch.created_at,
        };
        self.store
            .put(&Self::meta_path(batch.batch_id), serde_json::to_value(&meta)?)
            .await?;
        for (index, withdrawal) in batch.withdrawals.iter().enumerate() {
            self.store
                .put(
                    &Self::child_path(batch.batch_id, index),
                    serde_json::to_value(withdrawal)?,
                )
                .await?;
        }
        Ok(())
    }

    /// Load a batch, preferring the authoritative blob and falling back to
    /// per-index collection with bounded polling.
    pub async fn load(&self, batch_id: BatchId) -> Result<WithdrawalBatch> {
        if let Some(raw) = self.store.get(&Self::blob_path(batch_id)).await? {
            let batch: WithdrawalBatch = serde_json::from_value(raw)?;
            if !batch.verify_root() {
                return Err(BridgeError::BatchRootMismatch(batch_id));
            }
            return Ok(batch);
        }
        self.load_from_children(batch_id).await
    }

    async fn load_from_children(&self, batch_id: BatchId) -> Result<WithdrawalBatch> {
        let deadline = Instant::now() + Duration::from_millis(self.config.batch_poll_timeout_ms);
        let child_prefix = format!("{BATCHES_PATH}/{}/withdrawals", batch_id.0);

        loop {
            let meta: Option<BatchMeta> = match self.store.get(&Self::meta_path(batch_id)).await? {
                Some(raw) => Some(serde_json::from_value(raw)?),
                None => None,
            };

            let rows = self.store.list(&child_prefix).await?;
            let mut children: Vec<(usize, PendingWithdrawal)> = Vec::with_capacity(rows.len());
            let cut = format!("{child_prefix}/");
            for (path, raw) in rows {
                let Some(index) = path.strip_prefix(&cut).and_then(|s| s.parse::<usize>().ok())
                else {
                    continue;
                };
                children.push((index, serde_json::from_value(raw)?));
            }

            if let Some(meta) = &meta {
                if children.len() >= meta.count {
                    children.sort_by_key(|(index, _)| *index);
                    let withdrawals: Vec<PendingWithdrawal> =
                        children.into_iter().map(|(_, wd)| wd).collect();
                    let batch = WithdrawalBatch {
                        batch_id,
                        root: meta.root,
                        withdrawals,
                        created_at: meta.created_at,
                        block_number: None,
                        tx_hash: None,
                    };
                    if !batch.verify_root() {
                        return Err(BridgeError::BatchRootMismatch(batch_id));
                    }
                    return Ok(batch);
                }
            }

            if Instant::now() >= deadline {
                return Err(match meta {
                    None if children.is_empty() => BridgeError::BatchNotFound(batch_id),
                    Some(meta) => BridgeError::BatchIncomplete {
                        expected: meta.count,
                        collected: children.len(),
                    },
                    None => BridgeError::BatchIncomplete {
                        expected: 0,
                        collected: children.len(),
                    },
                });
            }
            sleep(Duration::from_millis(self.config.batch_poll_interval_ms)).await;
        }
    }

    /// Submit the batch root on-chain, record the receipt, and remove the
    /// settled withdrawals from the pending set (idempotently).
    pub async fn settle<C: ChainClient>(
        &self,
        chain: &C,
        queue: &WithdrawalQueue<S>,
        batch: &mut WithdrawalBatch,
    ) -> Result<BatchReceipt> {
        let receipt = chain.submit_batch(batch.root).await?;
        batch.block_number = Some(receipt.block_number);
        batch.tx_hash = Some(receipt.tx_hash.clone());

        self.store
            .put(&Self::blob_path(batch.batch_id), serde_json::to_value(&*batch)?)
            .await?;
        queue.remove_pending(&batch.withdrawals).await?;

        info!(
            batch = %batch.batch_id,
            tx = %receipt.tx_hash,
            block = receipt.block_number,
            "batch settled"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use openbridge_ledger::BalanceLedger;
    use openbridge_store::MemoryStore;
    use openbridge_types::{EthAddress, RelayKeypair};
    use rust_decimal::Decimal;

    use super::*;
    use crate::chain::mock::MockChainClient;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn relay() -> RelayKeypair {
        RelayKeypair::from_seed([1u8; 32])
    }

    fn trusted() -> TrustedSigners {
        TrustedSigners::One(relay().signer_id())
    }

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            batch_poll_timeout_ms: 1000,
            batch_poll_interval_ms: 50,
            ..BridgeConfig::default()
        }
    }

    async fn backed_withdrawal(
        store: &MemoryStore,
        user: EthAddress,
        amount: Decimal,
        nonce: u64,
    ) -> PendingWithdrawal {
        let ledger = BalanceLedger::new(store.clone(), BridgeConfig::default());
        ledger
            .credit(&user, amount + dec(50), &relay(), &trusted())
            .await
            .unwrap();
        let debit_hash = ledger
            .debit(&user, amount, &relay(), &trusted(), Some(nonce))
            .await
            .unwrap();
        PendingWithdrawal {
            user,
            amount,
            nonce,
            timestamp: Utc::now(),
            debit_hash,
        }
    }

    #[tokio::test]
    async fn build_verifies_and_persists() {
        let store = MemoryStore::new();
        let queue = WithdrawalQueue::new(store.clone(), fast_config());
        let builder = BatchBuilder::new(store.clone(), fast_config());

        let good = backed_withdrawal(&store, EthAddress::dummy(1), dec(20), 1).await;
        let forged = PendingWithdrawal::dummy(EthAddress::dummy(2), dec(9999), 1);

        let batch = builder
            .build(&queue, vec![good.clone(), forged], &trusted())
            .await
            .unwrap();

        // The forged withdrawal must never be batched.
        assert_eq!(batch.withdrawals, vec![good]);
        assert!(batch.verify_root());

        let loaded = builder.load(batch.batch_id).await.unwrap();
        assert_eq!(loaded.root, batch.root);
    }

    #[tokio::test]
    async fn load_falls_back_to_children() {
        let store = MemoryStore::new();
        let queue = WithdrawalQueue::new(store.clone(), fast_config());
        let builder = BatchBuilder::new(store.clone(), fast_config());

        let wd = backed_withdrawal(&store, EthAddress::dummy(1), dec(20), 1).await;
        let batch = builder.build(&queue, vec![wd], &trusted()).await.unwrap();

        // Simulate the blob never replicating to this relay.
        store
            .remove(&BatchBuilder::<MemoryStore>::blob_path(batch.batch_id))
            .await
            .unwrap();

        let loaded = builder.load(batch.batch_id).await.unwrap();
        assert_eq!(loaded.root, batch.root);
        assert_eq!(loaded.withdrawals, batch.withdrawals);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_waits_for_late_children() {
        // Every write is delayed, so right after persist nothing is
        // visible; the bounded polling loop must pick the records up once
        // they propagate.
        let store = MemoryStore::with_lag(Duration::from_millis(200));
        let builder = BatchBuilder::new(store.clone(), fast_config());

        let immediate = MemoryStore::new();
        let wd = backed_withdrawal(&immediate, EthAddress::dummy(1), dec(20), 1).await;
        let batch = WithdrawalBatch::assemble(vec![wd]);
        builder.persist(&batch).await.unwrap();

        let loaded = builder.load(batch.batch_id).await.unwrap();
        assert_eq!(loaded.root, batch.root);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_batch_times_out_not_found() {
        let builder = BatchBuilder::new(MemoryStore::new(), fast_config());
        let err = builder.load(BatchId::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::BatchNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_children_time_out_incomplete() {
        let store = MemoryStore::new();
        let builder = BatchBuilder::new(store.clone(), fast_config());

        let batch_id = BatchId::new();
        let meta = BatchMeta {
            batch_id,
            count: 2,
            root: [0u8; 32],
            created_at: Utc::now(),
        };
        store
            .put(
                &BatchBuilder::<MemoryStore>::meta_path(batch_id),
                serde_json::to_value(&meta).unwrap(),
            )
            .await
            .unwrap();
        store
            .put(
                &BatchBuilder::<MemoryStore>::child_path(batch_id, 0),
                serde_json::to_value(PendingWithdrawal::dummy(EthAddress::dummy(1), dec(5), 1))
                    .unwrap(),
            )
            .await
            .unwrap();

        let err = builder.load(batch_id).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::BatchIncomplete {
                expected: 2,
                collected: 1
            }
        ));
    }

    #[tokio::test]
    async fn tampered_blob_rejected() {
        let store = MemoryStore::new();
        let queue = WithdrawalQueue::new(store.clone(), fast_config());
        let builder = BatchBuilder::new(store.clone(), fast_config());

        let wd = backed_withdrawal(&store, EthAddress::dummy(1), dec(20), 1).await;
        let mut batch = builder.build(&queue, vec![wd], &trusted()).await.unwrap();

        // Tamper with the stored blob's amounts.
        batch.withdrawals[0].amount = dec(999);
        store
            .put(
                &BatchBuilder::<MemoryStore>::blob_path(batch.batch_id),
                serde_json::to_value(&batch).unwrap(),
            )
            .await
            .unwrap();

        let err = builder.load(batch.batch_id).await.unwrap_err();
        assert!(matches!(err, BridgeError::BatchRootMismatch(_)));
    }

    #[tokio::test]
    async fn settle_submits_and_drains_queue() {
        let store = MemoryStore::new();
        let queue = WithdrawalQueue::new(store.clone(), fast_config());
        let builder = BatchBuilder::new(store.clone(), fast_config());
        let chain = MockChainClient::new();

        let wd = backed_withdrawal(&store, EthAddress::dummy(1), dec(20), 1).await;
        queue.enqueue(&wd).await.unwrap();

        let mut batch = builder
            .build(&queue, queue.pending().await.unwrap(), &trusted())
            .await
            .unwrap();
        let receipt = builder.settle(&chain, &queue, &mut batch).await.unwrap();

        assert_eq!(chain.submitted_roots(), vec![batch.root]);
        assert_eq!(batch.tx_hash, Some(receipt.tx_hash));
        assert!(queue.pending().await.unwrap().is_empty());

        // Settling state is persisted on the blob.
        let loaded = builder.load(batch.batch_id).await.unwrap();
        assert_eq!(loaded.block_number, Some(receipt.block_number));

        // Removing again is fine.
        queue.remove_pending(&batch.withdrawals).await.unwrap();
    }
}

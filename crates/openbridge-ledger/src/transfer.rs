//! Authorized L2→L2 transfers.
//!
//! A transfer demands an [`AuthorizedAction`] — the proof type only the
//! dual-signature verifier can construct — so an unverified message cannot
//! reach this code path. Execution is debit-then-credit: the debit is
//! single-shot, and the credit's retry loop absorbs any propagation race on
//! the receiving side, so a partial failure self-heals rather than losing
//! funds. Every transfer also writes an immutable [`TransferRecord`] for
//! reconciliation.

use chrono::Utc;

use openbridge_authz::AuthorizedAction;
use openbridge_store::{ReplicatedStore, TrustedSigners};
use openbridge_types::{BridgeError, EntryHash, RelayKeypair, Result, TransferRecord};

use crate::ledger::BalanceLedger;

/// The artifacts of an executed transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Hash of the sender's debit snapshot.
    pub debit_hash: EntryHash,
    /// Hash of the recipient's credit snapshot.
    pub credit_hash: EntryHash,
    /// Hash of the frozen transfer record entry.
    pub record_entry: EntryHash,
    /// The transfer record itself.
    pub record: TransferRecord,
}

impl<S: ReplicatedStore> BalanceLedger<S> {
    /// Execute an authorized transfer: debit the sender, credit the
    /// recipient, record the transfer.
    pub async fn transfer(
        &self,
        authz: &AuthorizedAction,
        keypair: &RelayKeypair,
        trusted: &TrustedSigners,
    ) -> Result<TransferOutcome> {
        let from = authz.address();
        let to = authz
            .to()
            .ok_or(BridgeError::AuthorizationFieldMismatch { field: "to" })?;
        let amount = authz
            .amount()
            .ok_or(BridgeError::AuthorizationFieldMismatch { field: "amount" })?;

        let record = TransferRecord::new(from, to, amount, Utc::now());

        let debit_hash = self
            .debit_annotated(
                &from,
                amount,
                keypair,
                trusted,
                None,
                Some(record.transfer_hash),
            )
            .await?;
        let credit_hash = self.credit(&to, amount, keypair, trusted).await?;

        let record_entry = self
            .entries()
            .create(
                &record,
                keypair,
                &self.config().transfer_namespace,
                &record.transfer_hash.to_hex(),
            )
            .await?;

        Ok(TransferOutcome {
            debit_hash,
            credit_hash,
            record_entry,
            record,
        })
    }
}

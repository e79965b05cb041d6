//! Global solvency validation.
//!
//! The solvency invariant: the contract's escrowed balance must cover the
//! sum of every user's ledger balance. A violation means the ledger claims
//! more value than is escrowed — critical, alarm-worthy, and never
//! auto-corrected. The proportional remediation is gated behind an explicit
//! non-dry-run flag and is never invoked automatically.

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{error, info};

use openbridge_ledger::BalanceLedger;
use openbridge_store::{ReplicatedStore, TrustedSigners};
use openbridge_types::{BridgeConfig, BridgeError, EthAddress, RelayKeypair, Result};

use crate::chain::ChainClient;

/// Result of a solvency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyReport {
    /// Sum of all verified ledger balances.
    pub l2_supply: Decimal,
    /// The contract's escrowed balance.
    pub contract_balance: Decimal,
    /// Number of users enumerated.
    pub users: usize,
    /// `contract_balance - l2_supply`; negative means insolvent.
    pub discrepancy: Decimal,
    /// Whether the invariant holds.
    pub healthy: bool,
}

/// The plan (or record) of a proportional remediation.
#[derive(Debug, Clone)]
pub struct RemediationPlan {
    /// `contract_balance / l2_supply`, the scale factor applied.
    pub factor: Decimal,
    /// Per-user `(address, old balance, new balance)`.
    pub adjustments: Vec<(EthAddress, Decimal, Decimal)>,
    /// Whether the adjustments were actually written.
    pub applied: bool,
}

/// Validates the solvency invariant and, on explicit operator action,
/// remediates a violation.
pub struct SupplyValidator<C> {
    chain: C,
    config: BridgeConfig,
}

impl<C: ChainClient> SupplyValidator<C> {
    #[must_use]
    pub fn new(chain: C, config: BridgeConfig) -> Self {
        Self { chain, config }
    }

    /// Sum every known user's ledger balance and compare against the
    /// contract's escrow. A violation is logged as critical.
    pub async fn validate<S: ReplicatedStore>(
        &self,
        ledger: &BalanceLedger<S>,
        trusted: &TrustedSigners,
    ) -> Result<SupplyReport> {
        let (l2_supply, users) = self.l2_supply(ledger, trusted).await?;
        let contract_balance = self.chain.escrow_balance().await?;
        let discrepancy = contract_balance - l2_supply;
        let healthy = contract_balance >= l2_supply;

        if healthy {
            info!(%l2_supply, %contract_balance, users, "supply validated");
        } else {
            error!(
                %l2_supply, %contract_balance, %discrepancy,
                "SOLVENCY VIOLATION: ledger claims more than the contract escrows"
            );
        }

        Ok(SupplyReport {
            l2_supply,
            contract_balance,
            users,
            discrepancy,
            healthy,
        })
    }

    /// Proportionally scale every balance by `contract / l2_supply`.
    ///
    /// Destructive. With `dry_run` the plan is computed and returned but
    /// nothing is written. Errors with `RemediationUnnecessary` when the
    /// invariant holds.
    pub async fn fix_supply<S: ReplicatedStore>(
        &self,
        ledger: &BalanceLedger<S>,
        keypair: &RelayKeypair,
        trusted: &TrustedSigners,
        dry_run: bool,
    ) -> Result<RemediationPlan> {
        let report = self.validate(ledger, trusted).await?;
        if report.healthy {
            return Err(BridgeError::RemediationUnnecessary);
        }
        if report.l2_supply.is_zero() {
            // Unreachable in practice: zero supply cannot exceed escrow.
            return Err(BridgeError::Internal("zero supply flagged unhealthy".into()));
        }

        let factor = report.contract_balance / report.l2_supply;
        let mut adjustments = Vec::new();
        for key in ledger
            .entries()
            .list_index_keys(&self.config.balance_namespace)
            .await?
        {
            let Ok(user) = EthAddress::parse(&key) else {
                continue;
            };
            let old = ledger.balance_of(&user, trusted).await?;
            if old.is_zero() {
                continue;
            }
            // Round toward zero so the scaled total never exceeds escrow.
            let new = (old * factor).round_dp_with_strategy(18, RoundingStrategy::ToZero);
            adjustments.push((user, old, new));
        }

        if !dry_run {
            for (user, old, new) in &adjustments {
                ledger
                    .write_corrective_snapshot(user, *new, keypair)
                    .await?;
                info!(user = %user, %old, %new, "supply remediation applied");
            }
        }

        Ok(RemediationPlan {
            factor,
            adjustments,
            applied: !dry_run,
        })
    }

    async fn l2_supply<S: ReplicatedStore>(
        &self,
        ledger: &BalanceLedger<S>,
        trusted: &TrustedSigners,
    ) -> Result<(Decimal, usize)> {
        let keys = ledger
            .entries()
            .list_index_keys(&self.config.balance_namespace)
            .await?;
        let mut total = Decimal::ZERO;
        let mut users = 0;
        for key in keys {
            let Ok(user) = EthAddress::parse(&key) else {
                continue;
            };
            total += ledger.balance_of(&user, trusted).await?;
            users += 1;
        }
        Ok((total, users))
    }
}

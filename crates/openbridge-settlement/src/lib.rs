//! # openbridge-settlement
//!
//! **Settlement plane**: the pending-withdrawal queue, batch assembly and
//! on-chain settlement, idempotent deposit catch-up, per-user
//! reconciliation, and the global solvency check.
//!
//! ## Lifecycle
//!
//! ```text
//! debit → PendingWithdrawal (queued) → verify debit backing → WithdrawalBatch
//!       → submit root on-chain → settled → remove pending (idempotent)
//! ```
//!
//! Reconciliation and supply validation run as background health passes:
//! the former recomputes one user's balance from chain + ledger history
//! under an advisory TTL lock, the latter proves
//! `contract escrow >= Σ ledger balances` across every known user.

#![allow(async_fn_in_trait)]

pub mod batch;
pub mod chain;
pub mod deposits;
pub mod queue;
pub mod reconcile;
pub mod supply;

pub use batch::BatchBuilder;
pub use chain::{BatchReceipt, ChainClient, DepositEvent, WithdrawalEvent};
pub use deposits::DepositSync;
pub use queue::WithdrawalQueue;
pub use reconcile::{Reconciliation, ReconciliationEngine};
pub use supply::{RemediationPlan, SupplyReport, SupplyValidator};

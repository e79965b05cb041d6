//! # openbridge-types
//!
//! Shared types, errors, and configuration for the **OpenBridge** relay ledger.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`EthAddress`], [`EntryHash`], [`SignerId`], [`BatchId`]
//! - **Key material**: [`RelayKeypair`], [`verify_signature`]
//! - **Frozen-entry model**: [`FrozenEntry`], [`IndexPointer`], [`canonical_bytes`]
//! - **Balance model**: [`BalanceSnapshot`]
//! - **Withdrawal model**: [`PendingWithdrawal`], [`ForceWithdrawal`], [`WithdrawalBatch`]
//! - **Transfer model**: [`TransferRecord`]
//! - **Reconciliation model**: [`ReconciliationLock`], [`ProcessedDeposit`], [`NonceRecord`]
//! - **Registry model**: [`RelayInfo`], [`RelayStatus`]
//! - **Configuration**: [`BridgeConfig`]
//! - **Errors**: [`BridgeError`] with `BR_ERR_` prefix codes
//! - **Constants**: system-wide limits and the persisted key layout

pub mod balance;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod ids;
pub mod keys;
pub mod recon;
pub mod registry;
pub mod transfer;
pub mod withdrawal;

// Re-export all primary types at crate root for ergonomic imports:
//   use openbridge_types::{BalanceSnapshot, FrozenEntry, PendingWithdrawal, ...};

pub use balance::*;
pub use config::*;
pub use entry::*;
pub use error::*;
pub use ids::*;
pub use keys::*;
pub use recon::*;
pub use registry::*;
pub use transfer::*;
pub use withdrawal::*;

// Constants are accessed via `openbridge_types::constants::FOO`
// (not re-exported to avoid name collisions).

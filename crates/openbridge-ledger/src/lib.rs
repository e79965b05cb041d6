//! # openbridge-ledger
//!
//! The balance ledger: per-user balances as signed, content-addressed
//! frozen entries over an eventually-consistent store.
//!
//! ## The consistency model
//!
//! The substrate offers last-writer-wins and propagation delay — nothing
//! else. The ledger manufactures *local* read-your-writes behavior with a
//! read-repair retry loop (bounded attempts, linear-in-attempt backoff, a
//! monotonic non-regression acceptance rule, and a final catch-up check).
//! It does **not** manufacture global ordering across relays; cross-relay
//! drift is repaired by the reconciliation engine.
//!
//! ## Operations
//!
//! - `balance_of`: the `balance` field of the latest *verified* entry;
//!   absence and verification failure both read as zero (fail-safe).
//! - `credit`: retried until the new balance is observed (or provably
//!   superseded); never silently lost.
//! - `debit`: single-shot — a debit must not silently re-apply. Returns the
//!   entry hash that later proves the withdrawal's backing.
//! - `transfer`: dual-signature-authorized debit + credit + an immutable
//!   transfer record.

pub mod ledger;
pub mod transfer;

pub use ledger::BalanceLedger;
pub use transfer::TransferOutcome;

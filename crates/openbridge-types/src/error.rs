//! Error types for the OpenBridge relay ledger.
//!
//! All errors use the `BR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Frozen entry / verification errors
//! - 2xx: Balance errors
//! - 3xx: Authorization / nonce errors
//! - 4xx: Withdrawal / batch errors
//! - 5xx: Reconciliation / lock errors
//! - 6xx: Solvency errors
//! - 7xx: Store / chain transport errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{BatchId, EntryHash, EthAddress, SignerId};

/// Central error enum for all OpenBridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // =================================================================
    // Frozen Entry / Verification Errors (1xx)
    // =================================================================
    /// The requested frozen entry does not exist in the store.
    #[error("BR_ERR_100: Entry not found: {0}")]
    EntryNotFound(EntryHash),

    /// The entry failed signature or structural verification. Callers must
    /// treat the entry as absent — unverified data never influences balance.
    #[error("BR_ERR_101: Entry verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// The recomputed content hash does not match the stored one.
    #[error("BR_ERR_102: Content hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch {
        stored: EntryHash,
        computed: EntryHash,
    },

    /// The entry was signed by a key outside the trusted relay set.
    #[error("BR_ERR_103: Signer {0} is not a trusted relay")]
    UntrustedSigner(SignerId),

    /// No trusted signer set was supplied. Verification fails closed.
    #[error("BR_ERR_104: No trusted signers supplied; refusing to verify")]
    NoTrustedSigners,

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// Not enough balance to perform a debit or transfer.
    #[error("BR_ERR_200: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// A credit never became visible after the retry loop and final check.
    /// Carries the balances an operator needs to diagnose the failure.
    #[error(
        "BR_ERR_201: Credit not visible after retries: initial {initial}, \
         final {observed}, expected at least {expected}"
    )]
    CreditRetriesExhausted {
        initial: Decimal,
        observed: Decimal,
        expected: Decimal,
    },

    /// Ledger amounts must be strictly positive.
    #[error("BR_ERR_202: Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    // =================================================================
    // Authorization / Nonce Errors (3xx)
    // =================================================================
    /// The identity-keypair signature did not verify.
    #[error("BR_ERR_300: Identity signature invalid")]
    IdentitySignatureInvalid,

    /// The wallet ECDSA signature could not be recovered.
    #[error("BR_ERR_301: Wallet signature invalid: {reason}")]
    WalletSignatureInvalid { reason: String },

    /// The wallet signature recovered to a different address.
    #[error("BR_ERR_302: Recovered wallet address {recovered} does not match {expected}")]
    WalletSignerMismatch {
        expected: EthAddress,
        recovered: EthAddress,
    },

    /// The identity-signed payload does not match the presented message.
    #[error("BR_ERR_303: Signed payload does not match presented message")]
    PayloadMismatch,

    /// A declared field (`to`, `amount`, `nonce`, address) does not match
    /// the value the caller expected to be authorized.
    #[error("BR_ERR_304: Authorization field mismatch: {field}")]
    AuthorizationFieldMismatch { field: &'static str },

    /// The authorization timestamp is outside the freshness window.
    #[error("BR_ERR_305: Authorization timestamp outside freshness window (skew {skew_secs}s)")]
    StaleAuthorization { skew_secs: i64 },

    /// The authorization nonce was already used (replay attack prevention).
    #[error("BR_ERR_306: Nonce {nonce} already used for {user}")]
    NonceReplay { user: EthAddress, nonce: u64 },

    /// A withdrawal nonce must be strictly greater than the last accepted one.
    #[error("BR_ERR_307: Nonce {got} is not greater than last accepted {last}")]
    NonceNotMonotonic { last: u64, got: u64 },

    // =================================================================
    // Withdrawal / Batch Errors (4xx)
    // =================================================================
    /// A withdrawal with this `user:nonce` key is already queued.
    #[error("BR_ERR_400: Withdrawal already queued: {key}")]
    WithdrawalAlreadyQueued { key: String },

    /// The withdrawal's debit backing entry failed verification. The
    /// withdrawal must never be batched.
    #[error("BR_ERR_401: Debit backing invalid: {reason}")]
    DebitBackingInvalid { reason: String },

    /// The requested batch does not exist (blob and fallback both absent).
    #[error("BR_ERR_402: Batch not found: {0}")]
    BatchNotFound(BatchId),

    /// Fallback collection timed out before every child record arrived.
    #[error("BR_ERR_403: Batch incomplete: expected {expected} withdrawals, collected {collected}")]
    BatchIncomplete { expected: usize, collected: usize },

    /// A loaded batch's root does not match its withdrawals.
    #[error("BR_ERR_404: Batch root mismatch for {0}")]
    BatchRootMismatch(BatchId),

    // =================================================================
    // Reconciliation / Lock Errors (5xx)
    // =================================================================
    /// Another relay holds the reconciliation lock. Callers normally skip
    /// rather than surface this.
    #[error("BR_ERR_500: Reconciliation lock for {user} held by another relay")]
    LockHeld { user: EthAddress },

    /// A relay may only release a reconciliation lock it owns.
    #[error("BR_ERR_501: Refusing to release a reconciliation lock owned by another relay")]
    LockNotOwned,

    // =================================================================
    // Solvency Errors (6xx)
    // =================================================================
    /// The ledger claims more value than the contract escrows — critical,
    /// alarm-worthy, never auto-corrected.
    #[error(
        "BR_ERR_600: Supply invariant violation: ledger holds {l2_supply}, \
         contract escrows {contract_balance}"
    )]
    SupplyInvariantViolation {
        l2_supply: Decimal,
        contract_balance: Decimal,
    },

    /// `fix_supply` was invoked while the supply invariant holds.
    #[error("BR_ERR_601: Supply is healthy; nothing to remediate")]
    RemediationUnnecessary,

    // =================================================================
    // Store / Chain Transport Errors (7xx)
    // =================================================================
    /// A store write was not acknowledged within the timeout. Writes treat
    /// timeout as failure; the caller decides whether to retry.
    #[error("BR_ERR_700: Store write not acknowledged: {path}")]
    StoreWriteTimeout { path: String },

    /// The replicated store is unreachable or misbehaving.
    #[error("BR_ERR_701: Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The chain client failed an RPC call.
    #[error("BR_ERR_702: Chain client error: {0}")]
    ChainClient(String),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("BR_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("BR_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, bad key material, etc.).
    #[error("BR_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = BridgeError::EntryNotFound(EntryHash::dummy(1));
        let msg = format!("{err}");
        assert!(msg.starts_with("BR_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn insufficient_balance_display() {
        let err = BridgeError::InsufficientBalance {
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("BR_ERR_200"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn credit_exhaustion_carries_balances() {
        let err = BridgeError::CreditRetriesExhausted {
            initial: Decimal::new(10, 0),
            observed: Decimal::new(10, 0),
            expected: Decimal::new(15, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("initial 10"));
        assert!(msg.contains("final 10"));
        assert!(msg.contains("at least 15"));
    }

    #[test]
    fn all_errors_have_br_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(BridgeError::NoTrustedSigners),
            Box::new(BridgeError::IdentitySignatureInvalid),
            Box::new(BridgeError::PayloadMismatch),
            Box::new(BridgeError::LockNotOwned),
            Box::new(BridgeError::Internal("test".into())),
            Box::new(BridgeError::NonceNotMonotonic { last: 5, got: 5 }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("BR_ERR_"),
                "Error missing BR_ERR_ prefix: {msg}"
            );
        }
    }

    #[test]
    fn serde_error_converts() {
        let bad: std::result::Result<u64, _> = serde_json::from_str("not json");
        let err: BridgeError = bad.unwrap_err().into();
        assert!(matches!(err, BridgeError::Serialization(_)));
    }
}

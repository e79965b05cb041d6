//! Dual-signature verification.
//!
//! A user authorizes a transfer or withdrawal by presenting **one** message
//! under **two** independent signatures: an identity-keypair signature
//! (self-authenticating) and a wallet ECDSA signature recoverable to the
//! user's on-chain address. Verification checks, in order:
//!
//! 1. the identity signature verifies and recovers its payload;
//! 2. the recovered payload equals the presented message (canonical bytes);
//! 3. the wallet signature recovers to the expected address;
//! 4. the message's declared address equals the expected address;
//! 5. every caller-pinned field (`to`, `amount`, `nonce`) matches;
//! 6. the message timestamp is inside the freshness window;
//! 7. the nonce, if present, has not been seen before (recorded last, so a
//!    failed verification never burns a nonce).
//!
//! Every failure is a typed error and yields no partial trust. Success
//! yields an [`AuthorizedAction`], which only this module can construct —
//! downstream code that demands one cannot be handed an unverified message.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use openbridge_types::{
    BridgeConfig, BridgeError, EthAddress, Result, SignerId, canonical_bytes,
};

use crate::identity::SignedPayload;
use crate::nonce::ReplayCache;
use crate::wallet::recover_wallet_signer;

/// The message a user signs to authorize an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthMessage {
    /// The authorizing user's on-chain address.
    pub address: EthAddress,
    /// Transfer recipient, when authorizing a transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<EthAddress>,
    /// Amount being authorized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Withdrawal nonce, when authorizing a withdrawal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// When the user signed. Bounded by the freshness window.
    pub timestamp: DateTime<Utc>,
}

impl AuthMessage {
    /// An L2→L2 transfer authorization.
    #[must_use]
    pub fn transfer(address: EthAddress, to: EthAddress, amount: Decimal) -> Self {
        Self {
            address,
            to: Some(to),
            amount: Some(amount),
            nonce: None,
            timestamp: Utc::now(),
        }
    }

    /// A withdrawal authorization.
    #[must_use]
    pub fn withdrawal(address: EthAddress, amount: Decimal, nonce: u64) -> Self {
        Self {
            address,
            to: None,
            amount: Some(amount),
            nonce: Some(nonce),
            timestamp: Utc::now(),
        }
    }
}

/// Fields the caller requires the authorization to cover.
///
/// A `Some` pin must match the message exactly; `None` leaves the field
/// unconstrained. `timestamp_ref` anchors the freshness check.
#[derive(Debug, Clone)]
pub struct ExpectedAction {
    pub to: Option<EthAddress>,
    pub amount: Option<Decimal>,
    pub nonce: Option<u64>,
    pub timestamp_ref: DateTime<Utc>,
}

impl ExpectedAction {
    /// Pin a transfer's recipient and amount against the current time.
    #[must_use]
    pub fn for_transfer(to: EthAddress, amount: Decimal) -> Self {
        Self {
            to: Some(to),
            amount: Some(amount),
            nonce: None,
            timestamp_ref: Utc::now(),
        }
    }

    /// Pin a withdrawal's amount and nonce against the current time.
    #[must_use]
    pub fn for_withdrawal(amount: Decimal, nonce: u64) -> Self {
        Self {
            to: None,
            amount: Some(amount),
            nonce: Some(nonce),
            timestamp_ref: Utc::now(),
        }
    }
}

/// Proof that a message passed full dual-signature verification.
///
/// The private field keeps construction inside [`DualSignatureVerifier`].
#[derive(Debug, Clone)]
pub struct AuthorizedAction {
    message: AuthMessage,
}

impl AuthorizedAction {
    #[must_use]
    pub fn address(&self) -> EthAddress {
        self.message.address
    }

    #[must_use]
    pub fn to(&self) -> Option<EthAddress> {
        self.message.to
    }

    #[must_use]
    pub fn amount(&self) -> Option<Decimal> {
        self.message.amount
    }

    #[must_use]
    pub fn nonce(&self) -> Option<u64> {
        self.message.nonce
    }

    #[must_use]
    pub fn message(&self) -> &AuthMessage {
        &self.message
    }
}

/// Verifies dual-signature authorizations and tracks used nonces.
pub struct DualSignatureVerifier {
    freshness: Duration,
    replay: Mutex<ReplayCache>,
}

impl DualSignatureVerifier {
    /// A verifier with the given freshness window (seconds) and per-user
    /// used-nonce cap.
    #[must_use]
    pub fn new(freshness_secs: i64, replay_cap: usize) -> Self {
        Self {
            freshness: Duration::seconds(freshness_secs),
            replay: Mutex::new(ReplayCache::new(replay_cap)),
        }
    }

    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.auth_freshness_secs, config.replay_cache_cap)
    }

    /// Run the full verification algorithm. See the module docs for the
    /// ordered checks.
    pub fn verify(
        &self,
        message: &AuthMessage,
        identity_sig: &SignedPayload,
        wallet_sig: &[u8],
        expected_address: EthAddress,
        identity_key: &SignerId,
        expected: &ExpectedAction,
    ) -> Result<AuthorizedAction> {
        // (1) Identity signature: must be from the declared key and verify.
        if identity_sig.signer != *identity_key {
            return Err(BridgeError::IdentitySignatureInvalid);
        }
        let recovered_payload = identity_sig.verify()?;

        // (2) The recovered payload must equal the presented message.
        let message_bytes = canonical_bytes(message)?;
        if canonical_bytes(recovered_payload)? != message_bytes {
            return Err(BridgeError::PayloadMismatch);
        }

        // (3) Wallet signature must recover to the expected address.
        let recovered_address = recover_wallet_signer(&message_bytes, wallet_sig)?;
        if recovered_address != expected_address {
            return Err(BridgeError::WalletSignerMismatch {
                expected: expected_address,
                recovered: recovered_address,
            });
        }

        // (4) The message must declare the same address.
        if message.address != expected_address {
            return Err(BridgeError::AuthorizationFieldMismatch { field: "address" });
        }

        // (5) Caller-pinned fields.
        if let Some(to) = expected.to {
            if message.to != Some(to) {
                return Err(BridgeError::AuthorizationFieldMismatch { field: "to" });
            }
        }
        if let Some(amount) = expected.amount {
            if message.amount != Some(amount) {
                return Err(BridgeError::AuthorizationFieldMismatch { field: "amount" });
            }
        }
        if let Some(nonce) = expected.nonce {
            if message.nonce != Some(nonce) {
                return Err(BridgeError::AuthorizationFieldMismatch { field: "nonce" });
            }
        }

        // (6) Freshness: stale and future timestamps both rejected.
        let skew = (message.timestamp - expected.timestamp_ref).num_seconds();
        if skew.abs() > self.freshness.num_seconds() {
            return Err(BridgeError::StaleAuthorization { skew_secs: skew });
        }

        // (7) Replay. Recorded last: a message failing any earlier check
        // must not burn its nonce.
        if let Some(nonce) = message.nonce {
            self.replay
                .lock()
                .expect("replay cache mutex poisoned")
                .check_and_record(message.address, nonce)?;
        }

        Ok(AuthorizedAction {
            message: message.clone(),
        })
    }
}

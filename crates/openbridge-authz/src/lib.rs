//! # openbridge-authz
//!
//! **Authorization plane**: everything that decides whether a mutation is
//! allowed to touch the ledger.
//!
//! 1. **Identity signatures** (`identity`): ed25519, self-authenticating —
//!    verification recovers the signed payload.
//! 2. **Wallet signatures** (`wallet`): secp256k1 recoverable ECDSA over a
//!    Keccak-256 digest; recovery yields the signer's Ethereum address.
//! 3. **Dual-signature verification** (`dual`): one message, both signatures,
//!    field pinning, freshness window, replay rejection. Success produces an
//!    [`AuthorizedAction`] that only the verifier can construct.
//! 4. **Nonce defense** (`nonce`): strictly monotonic persisted withdrawal
//!    nonces plus a bounded per-user used-nonce cache.
//! 5. **Trust registry** (`registry`): TTL-cached set of relay keys
//!    authorized to write balances, refreshed from the external registry.

#![allow(async_fn_in_trait)]

pub mod dual;
pub mod identity;
pub mod nonce;
pub mod registry;
pub mod wallet;

pub use dual::{AuthMessage, AuthorizedAction, DualSignatureVerifier, ExpectedAction};
pub use identity::SignedPayload;
pub use nonce::{NonceGuard, ReplayCache};
pub use registry::{RegistryClient, TrustRegistry};

//! Configuration for an OpenBridge relay process.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Tunables for a single relay. `Default` sources every value from
/// [`constants`]; tests shrink the windows to keep runs fast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Namespace for balance frozen entries.
    pub balance_namespace: String,
    /// Namespace for transfer records.
    pub transfer_namespace: String,
    /// Maximum attempts for the credit read-repair loop.
    pub credit_max_attempts: u32,
    /// Base backoff (milliseconds) between credit attempts.
    pub credit_backoff_base_ms: u64,
    /// Dual-signature freshness window in seconds.
    pub auth_freshness_secs: i64,
    /// Per-user used-nonce cache cap.
    pub replay_cache_cap: usize,
    /// Reconciliation lock TTL in seconds.
    pub reconciliation_lock_ttl_secs: i64,
    /// Total window for batch fallback collection (milliseconds).
    pub batch_poll_timeout_ms: u64,
    /// Interval between batch fallback polls (milliseconds).
    pub batch_poll_interval_ms: u64,
    /// Trusted-relay cache TTL in seconds.
    pub registry_cache_ttl_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            balance_namespace: constants::DEFAULT_BALANCE_NAMESPACE.to_string(),
            transfer_namespace: constants::DEFAULT_TRANSFER_NAMESPACE.to_string(),
            credit_max_attempts: constants::MAX_CREDIT_ATTEMPTS,
            credit_backoff_base_ms: constants::CREDIT_BACKOFF_BASE_MS,
            auth_freshness_secs: constants::AUTH_FRESHNESS_WINDOW_SECS,
            replay_cache_cap: constants::REPLAY_CACHE_CAP,
            reconciliation_lock_ttl_secs: constants::RECONCILIATION_LOCK_TTL_SECS,
            batch_poll_timeout_ms: constants::BATCH_POLL_TIMEOUT_MS,
            batch_poll_interval_ms: constants::BATCH_POLL_INTERVAL_MS,
            registry_cache_ttl_secs: constants::REGISTRY_CACHE_TTL_SECS,
        }
    }
}

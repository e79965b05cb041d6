//! System-wide constants for the OpenBridge relay ledger, including the
//! persisted key layout.

/// Maximum attempts for the credit read-repair retry loop.
pub const MAX_CREDIT_ATTEMPTS: u32 = 5;

/// Base backoff for credit retries (multiplied by the attempt number).
pub const CREDIT_BACKOFF_BASE_MS: u64 = 100;

/// Freshness window for dual-signature authorization timestamps.
/// Minutes, not hours: an authorization older (or further in the future)
/// than this is rejected as stale.
pub const AUTH_FRESHNESS_WINDOW_SECS: i64 = 300;

/// Maximum used-nonce entries retained per user (oldest evicted first).
pub const REPLAY_CACHE_CAP: usize = 1000;

/// TTL for the advisory per-user reconciliation lock.
pub const RECONCILIATION_LOCK_TTL_SECS: i64 = 60;

/// Total window for collecting a batch's per-index fallback children.
pub const BATCH_POLL_TIMEOUT_MS: u64 = 5000;

/// Interval between fallback collection polls.
pub const BATCH_POLL_INTERVAL_MS: u64 = 250;

/// TTL for the cached trusted-relay set.
pub const REGISTRY_CACHE_TTL_SECS: u64 = 300;

/// Timeout for store write acknowledgements. A write that is not
/// acknowledged within this window is treated as failed.
pub const STORE_ACK_TIMEOUT_MS: u64 = 2000;

/// Default namespace for balance entries.
pub const DEFAULT_BALANCE_NAMESPACE: &str = "bridge-balances";

/// Default namespace for transfer records.
pub const DEFAULT_TRANSFER_NAMESPACE: &str = "bridge-transfers";

// ---------------------------------------------------------------------------
// Persisted key layout.
//
//   frozen-<ns>/<hash>                              FrozenEntry
//   <ns>-index/<indexKey>                           IndexPointer
//   bridge/withdrawals/pending/<user>:<nonce>       PendingWithdrawal
//   bridge/batches/<batchId>                        WithdrawalBatch blob
//   bridge/batches/<batchId>/meta                   fallback meta (count)
//   bridge/batches/<batchId>/withdrawals/<i>        fallback children
//   bridge/processed-deposits/<txHash:user:amount>  ProcessedDeposit
//   bridge/nonces/<user>                            NonceRecord
//   bridge/reconciliation-locks/<user>              ReconciliationLock
//   bridge/force-withdrawals/pending/<hash>         ForceWithdrawal
// ---------------------------------------------------------------------------

/// Prefix for frozen-entry namespaces: `frozen-<ns>/<hash>`.
pub const FROZEN_PREFIX: &str = "frozen-";

/// Suffix for index-pointer namespaces: `<ns>-index/<indexKey>`.
pub const INDEX_SUFFIX: &str = "-index";

/// Pending withdrawals, keyed `<user>:<nonce>`.
pub const PENDING_WITHDRAWALS_PATH: &str = "bridge/withdrawals/pending";

/// Emergency withdrawal queue, keyed by entry hash.
pub const FORCE_WITHDRAWALS_PATH: &str = "bridge/force-withdrawals/pending";

/// Settlement batches, keyed by batch id.
pub const BATCHES_PATH: &str = "bridge/batches";

/// Processed-deposit idempotency markers.
pub const PROCESSED_DEPOSITS_PATH: &str = "bridge/processed-deposits";

/// Persisted per-user withdrawal nonces.
pub const NONCES_PATH: &str = "bridge/nonces";

/// Advisory reconciliation locks, one per user.
pub const RECONCILIATION_LOCKS_PATH: &str = "bridge/reconciliation-locks";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenBridge";

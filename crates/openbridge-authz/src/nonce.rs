//! Nonce defense: two independent mechanisms.
//!
//! 1. [`ReplayCache`] — a short-horizon used-nonce set per user for
//!    dual-signature messages, capped at the most recent entries (oldest
//!    evicted first) to bound memory.
//! 2. [`NonceGuard`] — the strictly monotonic per-user withdrawal nonce,
//!    persisted to `bridge/nonces/<user>` and loaded into memory at startup.
//!
//! Both are process-local caches. In a multi-relay deployment each relay
//! enforces its own copy; cross-relay replay prevention ultimately rests on
//! the debit frozen entry being the source of truth.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::RwLock;
use tracing::warn;

use openbridge_store::ReplicatedStore;
use openbridge_types::constants::NONCES_PATH;
use openbridge_types::{BridgeError, EthAddress, NonceRecord, Result};

// ---------------------------------------------------------------------------
// ReplayCache
// ---------------------------------------------------------------------------

/// Per-user bounded used-nonce set with FIFO eviction.
pub struct ReplayCache {
    users: HashMap<EthAddress, UserNonces>,
    cap: usize,
}

struct UserNonces {
    seen: HashSet<u64>,
    order: VecDeque<u64>,
}

impl ReplayCache {
    /// # Panics
    /// Panics if `cap` is zero.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        assert!(cap > 0, "ReplayCache cap must be > 0");
        Self {
            users: HashMap::new(),
            cap,
        }
    }

    /// Check and record a nonce for a user.
    ///
    /// # Errors
    /// Returns [`BridgeError::NonceReplay`] if the nonce was already seen.
    pub fn check_and_record(&mut self, user: EthAddress, nonce: u64) -> Result<()> {
        let entry = self.users.entry(user).or_insert_with(|| UserNonces {
            seen: HashSet::new(),
            order: VecDeque::new(),
        });

        if entry.seen.contains(&nonce) {
            return Err(BridgeError::NonceReplay { user, nonce });
        }

        if entry.seen.len() >= self.cap {
            if let Some(oldest) = entry.order.pop_front() {
                entry.seen.remove(&oldest);
            }
        }

        entry.seen.insert(nonce);
        entry.order.push_back(nonce);
        Ok(())
    }

    /// Number of nonces currently tracked for a user.
    #[must_use]
    pub fn len_for(&self, user: &EthAddress) -> usize {
        self.users.get(user).map_or(0, |u| u.seen.len())
    }
}

// ---------------------------------------------------------------------------
// NonceGuard
// ---------------------------------------------------------------------------

/// Strictly monotonic per-user withdrawal nonces, cached in memory and
/// persisted through the replicated store.
pub struct NonceGuard<S> {
    store: S,
    last: RwLock<HashMap<EthAddress, u64>>,
}

impl<S: ReplicatedStore> NonceGuard<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            last: RwLock::new(HashMap::new()),
        }
    }

    /// Load every persisted nonce record into memory. Called at startup.
    pub async fn load(&self) -> Result<usize> {
        let rows = self.store.list(NONCES_PATH).await?;
        let prefix = format!("{NONCES_PATH}/");
        let mut last = self.last.write().await;
        let mut loaded = 0;
        for (path, value) in rows {
            let Some(key) = path.strip_prefix(&prefix) else {
                continue;
            };
            let Ok(user) = EthAddress::parse(key) else {
                warn!(path, "skipping nonce record with unparsable user key");
                continue;
            };
            match serde_json::from_value::<NonceRecord>(value) {
                Ok(record) => {
                    last.insert(user, record.last_nonce);
                    loaded += 1;
                }
                Err(e) => warn!(path, error = %e, "skipping malformed nonce record"),
            }
        }
        Ok(loaded)
    }

    /// Validate that `nonce` is strictly greater than the last accepted one.
    pub async fn validate_incremental(&self, user: EthAddress, nonce: u64) -> Result<()> {
        let last = self.last.read().await;
        if let Some(&prev) = last.get(&user) {
            if nonce <= prev {
                return Err(BridgeError::NonceNotMonotonic {
                    last: prev,
                    got: nonce,
                });
            }
        }
        Ok(())
    }

    /// Record an accepted nonce: memory first, then persistence. A persist
    /// failure is logged but does not roll back the in-memory state — the
    /// cache is authoritative until the next restart.
    pub async fn commit(&self, user: EthAddress, nonce: u64) -> Result<()> {
        {
            let mut last = self.last.write().await;
            let entry = last.entry(user).or_insert(0);
            *entry = (*entry).max(nonce);
        }

        let path = format!("{NONCES_PATH}/{}", user.index_key());
        let record = NonceRecord::new(nonce);
        if let Err(e) = self.store.put(&path, serde_json::to_value(record)?).await {
            warn!(user = %user, nonce, error = %e, "failed to persist nonce record");
        }
        Ok(())
    }

    /// The last accepted nonce for a user, if any.
    pub async fn last_nonce(&self, user: &EthAddress) -> Option<u64> {
        self.last.read().await.get(user).copied()
    }
}

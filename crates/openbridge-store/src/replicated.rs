//! The replicated-store capability.
//!
//! The external graph store is multi-writer and eventually consistent: no
//! transactions, no locks, no total order, last-writer-wins merge with
//! propagation delay. Children of a path may arrive after the parent. The
//! trait below is the seam everything else is written against; callers must
//! tolerate stale reads and never assume read-after-write.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use openbridge_types::Result;

/// Async key-path addressed storage with last-writer-wins semantics.
///
/// Contract:
/// - `put` resolves once the write is acknowledged; an unacknowledged write
///   is an error the caller must handle (retry or fail).
/// - `get` resolves to `None` on both absence and timeout — reads degrade to
///   "no data", never hang.
/// - `list` returns the currently-visible children of a prefix; late
///   arrivals are the caller's problem (bounded polling).
/// - `remove` is an idempotent tombstone write.
pub trait ReplicatedStore {
    async fn put(&self, path: &str, value: Value) -> Result<()>;
    async fn get(&self, path: &str) -> Result<Option<Value>>;
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>>;
    async fn remove(&self, path: &str) -> Result<()>;
}

/// In-process store used by tests and single-node deployments.
///
/// Models the substrate's weak guarantees: an optional propagation lag keeps
/// each write invisible until the lag elapses, so a read immediately after a
/// write observes the previous value — exactly the stale-read condition the
/// ledger's retry loop exists to absorb. Under a paused tokio clock the lag
/// elapses as test sleeps advance time.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    lag: Duration,
}

struct Inner {
    visible: BTreeMap<String, Value>,
    pending: VecDeque<PendingWrite>,
    writes: u64,
}

struct PendingWrite {
    visible_at: Instant,
    path: String,
    /// `None` is a tombstone.
    value: Option<Value>,
}

impl MemoryStore {
    /// A store with immediate visibility (no artificial lag).
    #[must_use]
    pub fn new() -> Self {
        Self::with_lag(Duration::ZERO)
    }

    /// A store whose writes only become visible after `lag`.
    #[must_use]
    pub fn with_lag(lag: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                visible: BTreeMap::new(),
                pending: VecDeque::new(),
                writes: 0,
            })),
            lag,
        }
    }

    /// Number of writes (puts and removes) accepted so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.lock().expect("store mutex poisoned").writes
    }

    /// Snapshot of every currently-visible record. Diagnostic only.
    #[must_use]
    pub fn dump(&self) -> Vec<(String, Value)> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        Self::flush(&mut inner);
        inner
            .visible
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn flush(inner: &mut Inner) {
        let now = Instant::now();
        while let Some(front) = inner.pending.front() {
            if front.visible_at > now {
                break;
            }
            let write = inner.pending.pop_front().expect("front checked");
            match write.value {
                Some(value) => {
                    inner.visible.insert(write.path, value);
                }
                None => {
                    inner.visible.remove(&write.path);
                }
            }
        }
    }

    fn write(&self, path: &str, value: Option<Value>) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.writes += 1;
        if self.lag.is_zero() {
            match value {
                Some(v) => {
                    inner.visible.insert(path.to_string(), v);
                }
                None => {
                    inner.visible.remove(path);
                }
            }
        } else {
            let visible_at = Instant::now() + self.lag;
            inner.pending.push_back(PendingWrite {
                visible_at,
                path: path.to_string(),
                value,
            });
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicatedStore for MemoryStore {
    async fn put(&self, path: &str, value: Value) -> Result<()> {
        self.write(path, Some(value));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        Self::flush(&mut inner);
        Ok(inner.visible.get(path).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        let needle = format!("{prefix}/");
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        Self::flush(&mut inner);
        Ok(inner
            .visible
            .range(needle.clone()..)
            .take_while(|(k, _)| k.starts_with(&needle))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.write(path, None);
        Ok(())
    }
}

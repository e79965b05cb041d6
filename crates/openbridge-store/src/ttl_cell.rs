//! Single-value TTL cache.
//!
//! Used for data that changes infrequently but is expensive to fetch —
//! the trusted-relay set above all. Unlike an eviction cache there is one
//! slot: a value and the instant it was stored. `stale` exposes the expired
//! value so callers can fall back to it when a refresh fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// A thread-safe TTL cache holding one cloneable value.
pub struct TtlCell<T: Clone> {
    slot: RwLock<Option<(T, Instant)>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone> TtlCell<T> {
    /// Create an empty cell with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cell with TTL specified in seconds.
    #[must_use]
    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// The cached value, if it is still within its TTL.
    pub async fn get_if_fresh(&self) -> Option<T> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some((value, stored_at)) if stored_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// The cached value regardless of age. For refresh-failure fallback.
    pub async fn stale(&self) -> Option<T> {
        self.slot.read().await.as_ref().map(|(v, _)| v.clone())
    }

    /// Store a fresh value.
    pub async fn set(&self, value: T) {
        let mut slot = self.slot.write().await;
        *slot = Some((value, Instant::now()));
    }

    /// Drop the cached value, forcing the next access to refresh.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }

    /// Hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                self.hits as f64 / total as f64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_cell_misses() {
        let cell = TtlCell::<u64>::with_secs(10);
        assert!(cell.get_if_fresh().await.is_none());
        assert!(cell.stale().await.is_none());
    }

    #[tokio::test]
    async fn set_then_get() {
        let cell = TtlCell::with_secs(10);
        cell.set(vec![1u8, 2, 3]).await;
        assert_eq!(cell.get_if_fresh().await, Some(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn value_expires() {
        let cell = TtlCell::new(Duration::from_millis(50));
        cell.set(42u64).await;
        assert_eq!(cell.get_if_fresh().await, Some(42));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cell.get_if_fresh().await.is_none());
        // But the stale value is still reachable for fallback.
        assert_eq!(cell.stale().await, Some(42));
    }

    #[tokio::test]
    async fn invalidate_clears() {
        let cell = TtlCell::with_secs(100);
        cell.set(1u64).await;
        cell.invalidate().await;
        assert!(cell.get_if_fresh().await.is_none());
        assert!(cell.stale().await.is_none());
    }

    #[tokio::test]
    async fn stats_count_hits_and_misses() {
        let cell = TtlCell::with_secs(100);
        let _ = cell.get_if_fresh().await; // miss
        cell.set(7u64).await;
        let _ = cell.get_if_fresh().await; // hit
        let _ = cell.get_if_fresh().await; // hit
        let _ = cell.get_if_fresh().await; // hit

        let stats = cell.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.75).abs() < 0.01);
    }
}

//! Per-key advisory locking.
//!
//! The ledger serializes same-user mutations within one process through a
//! keyed mutex. The guard is owned, so release-on-all-exit-paths is
//! structural — dropping the guard (return, `?`, panic unwind) releases the
//! lock. This is process-local only: cross-process races are handled by the
//! ledger's retry-reverify protocol, not by this lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A map of independently lockable keys.
pub struct KeyedMutex {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedMutex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().expect("keyed mutex poisoned");
            // Drop map entries nobody is waiting on, so the map tracks the
            // working set rather than every key ever locked.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        slot.lock_owned().await
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.locks.lock().expect("keyed mutex poisoned").len()
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}

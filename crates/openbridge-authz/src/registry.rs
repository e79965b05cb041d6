//! The trusted-relay registry cache.
//!
//! Trust is anchored externally: an on-chain registry lists the signer keys
//! permitted to write balances. This module caches the active set with a
//! TTL to keep registry round-trips off the hot path. When a refresh fails
//! and a previous set exists, the stale set is served with a warning —
//! verification still fails closed if the set is empty.

use std::time::Duration;

use tracing::warn;

use openbridge_store::{TrustedSigners, TtlCell};
use openbridge_types::{RelayInfo, Result, SignerId};

/// Capability trait for the external relay registry.
pub trait RegistryClient {
    /// All registered relays with their current status.
    async fn active_relays(&self) -> Result<Vec<RelayInfo>>;
}

/// TTL-cached view of the trusted signer set.
pub struct TrustRegistry<R> {
    client: R,
    cache: TtlCell<Vec<SignerId>>,
}

impl<R: RegistryClient> TrustRegistry<R> {
    #[must_use]
    pub fn new(client: R, ttl_secs: u64) -> Self {
        Self {
            client,
            cache: TtlCell::new(Duration::from_secs(ttl_secs)),
        }
    }

    /// The current trusted signer set, refreshed when the cache expires.
    ///
    /// # Errors
    /// Only errors when a refresh fails *and* no previous set was ever
    /// cached.
    pub async fn trusted_signers(&self) -> Result<TrustedSigners> {
        if let Some(signers) = self.cache.get_if_fresh().await {
            return Ok(TrustedSigners::from_vec(signers));
        }

        match self.client.active_relays().await {
            Ok(relays) => {
                let signers: Vec<SignerId> = relays
                    .iter()
                    .filter(|r| r.is_trusted())
                    .map(|r| r.signer)
                    .collect();
                self.cache.set(signers.clone()).await;
                Ok(TrustedSigners::from_vec(signers))
            }
            Err(e) => match self.cache.stale().await {
                Some(signers) => {
                    warn!(error = %e, "registry refresh failed; serving stale trusted set");
                    Ok(TrustedSigners::from_vec(signers))
                }
                None => Err(e),
            },
        }
    }

    /// Force the next call to hit the registry.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock {
    //! A scriptable registry for tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use openbridge_types::{BridgeError, RelayInfo, Result};

    use super::RegistryClient;

    /// In-memory registry whose relay set and failure mode tests control.
    #[derive(Default)]
    pub struct MockRegistry {
        relays: Mutex<Vec<RelayInfo>>,
        fail: AtomicBool,
        calls: AtomicU64,
    }

    impl MockRegistry {
        #[must_use]
        pub fn with_relays(relays: Vec<RelayInfo>) -> Self {
            Self {
                relays: Mutex::new(relays),
                fail: AtomicBool::new(false),
                calls: AtomicU64::new(0),
            }
        }

        pub fn set_relays(&self, relays: Vec<RelayInfo>) {
            *self.relays.lock().expect("mock registry poisoned") = relays;
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        #[must_use]
        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RegistryClient for MockRegistry {
        async fn active_relays(&self) -> Result<Vec<RelayInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(BridgeError::ChainClient("registry unreachable".into()));
            }
            Ok(self.relays.lock().expect("mock registry poisoned").clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use openbridge_types::{RelayStatus, SignerId};

    use super::mock::MockRegistry;
    use super::*;

    fn relay(tag: u8, status: RelayStatus) -> RelayInfo {
        RelayInfo {
            signer: SignerId([tag; 32]),
            status,
        }
    }

    #[tokio::test]
    async fn only_active_relays_are_trusted() {
        let registry = TrustRegistry::new(
            MockRegistry::with_relays(vec![
                relay(1, RelayStatus::Active),
                relay(2, RelayStatus::Suspended),
            ]),
            300,
        );

        let trusted = registry.trusted_signers().await.unwrap();
        assert!(trusted.contains(&SignerId([1u8; 32])));
        assert!(!trusted.contains(&SignerId([2u8; 32])));
    }

    #[tokio::test]
    async fn cache_avoids_repeat_calls() {
        let mock = MockRegistry::with_relays(vec![relay(1, RelayStatus::Active)]);
        let registry = TrustRegistry::new(mock, 300);

        registry.trusted_signers().await.unwrap();
        registry.trusted_signers().await.unwrap();
        registry.trusted_signers().await.unwrap();
        assert_eq!(registry.client.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_failure_serves_stale_set() {
        let mock = MockRegistry::with_relays(vec![relay(1, RelayStatus::Active)]);
        let registry = TrustRegistry::new(mock, 300);

        registry.trusted_signers().await.unwrap();
        registry.client.set_fail(true);
        registry.invalidate().await;

        let trusted = registry.trusted_signers().await.unwrap();
        assert!(trusted.contains(&SignerId([1u8; 32])));
    }

    #[tokio::test]
    async fn refresh_failure_with_no_cache_errors() {
        let mock = MockRegistry::default();
        mock.set_fail(true);
        let registry = TrustRegistry::new(mock, 300);
        assert!(registry.trusted_signers().await.is_err());
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let mock = MockRegistry::with_relays(vec![relay(1, RelayStatus::Active)]);
        let registry = TrustRegistry::new(mock, 300);

        registry.trusted_signers().await.unwrap();
        registry
            .client
            .set_relays(vec![relay(3, RelayStatus::Active)]);
        registry.invalidate().await;

        let trusted = registry.trusted_signers().await.unwrap();
        assert!(trusted.contains(&SignerId([3u8; 32])));
        assert!(!trusted.contains(&SignerId([1u8; 32])));
    }
}

//! Trusted-relay registry records.
//!
//! The on-chain registry is the root of trust for which signer keys may
//! write balances. Only [`RelayStatus::Active`] relays are trusted.

use serde::{Deserialize, Serialize};

use crate::SignerId;

/// Registration status of a relay in the external registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayStatus {
    /// Registered and permitted to write balances.
    Active,
    /// Registered but currently not trusted.
    Suspended,
}

impl std::fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
        }
    }
}

/// A relay entry as reported by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayInfo {
    /// The relay's identity key.
    pub signer: SignerId,
    /// Current registration status.
    pub status: RelayStatus,
}

impl RelayInfo {
    /// Whether this relay's writes should be trusted.
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        self.status == RelayStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_is_trusted() {
        let active = RelayInfo {
            signer: SignerId([1u8; 32]),
            status: RelayStatus::Active,
        };
        let suspended = RelayInfo {
            signer: SignerId([2u8; 32]),
            status: RelayStatus::Suspended,
        };
        assert!(active.is_trusted());
        assert!(!suspended.is_trusted());
    }

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", RelayStatus::Active), "ACTIVE");
        assert_eq!(format!("{}", RelayStatus::Suspended), "SUSPENDED");
    }
}

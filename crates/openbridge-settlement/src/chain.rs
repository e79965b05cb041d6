//! The chain-client capability.
//!
//! The on-chain escrow contract is consumed through this seam: querying
//! deposit and withdrawal events, reading the escrowed balance, and
//! submitting batch roots. Transaction signing and RPC plumbing live behind
//! the implementation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use openbridge_types::{EthAddress, Result};

/// An on-chain deposit into the escrow contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepositEvent {
    pub tx_hash: String,
    pub user: EthAddress,
    pub amount: Decimal,
    pub block_number: u64,
}

/// A withdrawal settled by the escrow contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalEvent {
    pub tx_hash: String,
    pub user: EthAddress,
    pub amount: Decimal,
    pub nonce: u64,
    pub block_number: u64,
}

/// Receipt for a submitted batch root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// Capability trait for the bridge escrow contract.
pub trait ChainClient {
    /// Deposit events in `[from_block, to_block]`, optionally filtered by
    /// user.
    async fn query_deposits(
        &self,
        from_block: u64,
        to_block: u64,
        user: Option<EthAddress>,
    ) -> Result<Vec<DepositEvent>>;

    /// Settled withdrawal events in `[from_block, to_block]`, optionally
    /// filtered by user.
    async fn query_withdrawals(
        &self,
        from_block: u64,
        to_block: u64,
        user: Option<EthAddress>,
    ) -> Result<Vec<WithdrawalEvent>>;

    /// The contract's current escrowed balance.
    async fn escrow_balance(&self) -> Result<Decimal>;

    /// Submit a batch root commitment for settlement.
    async fn submit_batch(&self, root: [u8; 32]) -> Result<BatchReceipt>;

    /// Whether a `(user, nonce)` withdrawal has already settled on-chain.
    async fn is_withdrawal_processed(&self, user: EthAddress, nonce: u64) -> Result<bool>;

    /// The newest block number the client has seen.
    async fn latest_block(&self) -> Result<u64>;
}

pub mod mock {
    //! A scriptable in-memory chain, for tests and local development.

    use std::sync::{Arc, Mutex};

    use rust_decimal::Decimal;

    use openbridge_types::{EthAddress, Result};

    use super::{BatchReceipt, ChainClient, DepositEvent, WithdrawalEvent};

    #[derive(Default)]
    struct State {
        deposits: Vec<DepositEvent>,
        withdrawals: Vec<WithdrawalEvent>,
        escrow: Decimal,
        submitted: Vec<[u8; 32]>,
        block: u64,
    }

    /// In-memory escrow contract. Deposits raise the escrowed balance,
    /// settled withdrawals lower it, batch submissions are recorded.
    /// Clones share state — like any real chain client, this is a handle.
    #[derive(Clone, Default)]
    pub struct MockChainClient {
        state: Arc<Mutex<State>>,
    }

    impl MockChainClient {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Record a deposit event and escrow its amount.
        pub fn add_deposit(&self, tx_hash: &str, user: EthAddress, amount: Decimal) {
            let mut state = self.state.lock().expect("mock chain poisoned");
            state.block += 1;
            let block_number = state.block;
            state.escrow += amount;
            state.deposits.push(DepositEvent {
                tx_hash: tx_hash.to_string(),
                user,
                amount,
                block_number,
            });
        }

        /// Record a settled withdrawal and release its amount from escrow.
        pub fn settle_withdrawal(&self, tx_hash: &str, user: EthAddress, amount: Decimal, nonce: u64) {
            let mut state = self.state.lock().expect("mock chain poisoned");
            state.block += 1;
            let block_number = state.block;
            state.escrow -= amount;
            state.withdrawals.push(WithdrawalEvent {
                tx_hash: tx_hash.to_string(),
                user,
                amount,
                nonce,
                block_number,
            });
        }

        /// Force the escrowed balance (for solvency-violation scenarios).
        pub fn set_escrow(&self, escrow: Decimal) {
            self.state.lock().expect("mock chain poisoned").escrow = escrow;
        }

        /// Roots submitted so far.
        #[must_use]
        pub fn submitted_roots(&self) -> Vec<[u8; 32]> {
            self.state.lock().expect("mock chain poisoned").submitted.clone()
        }
    }

    impl ChainClient for MockChainClient {
        async fn query_deposits(
            &self,
            from_block: u64,
            to_block: u64,
            user: Option<EthAddress>,
        ) -> Result<Vec<DepositEvent>> {
            let state = self.state.lock().expect("mock chain poisoned");
            Ok(state
                .deposits
                .iter()
                .filter(|d| d.block_number >= from_block && d.block_number <= to_block)
                .filter(|d| user.is_none_or(|u| d.user == u))
                .cloned()
                .collect())
        }

        async fn query_withdrawals(
            &self,
            from_block: u64,
            to_block: u64,
            user: Option<EthAddress>,
        ) -> Result<Vec<WithdrawalEvent>> {
            let state = self.state.lock().expect("mock chain poisoned");
            Ok(state
                .withdrawals
                .iter()
                .filter(|w| w.block_number >= from_block && w.block_number <= to_block)
                .filter(|w| user.is_none_or(|u| w.user == u))
                .cloned()
                .collect())
        }

        async fn escrow_balance(&self) -> Result<Decimal> {
            Ok(self.state.lock().expect("mock chain poisoned").escrow)
        }

        async fn submit_batch(&self, root: [u8; 32]) -> Result<BatchReceipt> {
            let mut state = self.state.lock().expect("mock chain poisoned");
            state.block += 1;
            state.submitted.push(root);
            Ok(BatchReceipt {
                tx_hash: format!("0xbatch{:04}", state.submitted.len()),
                block_number: state.block,
            })
        }

        async fn is_withdrawal_processed(&self, user: EthAddress, nonce: u64) -> Result<bool> {
            let state = self.state.lock().expect("mock chain poisoned");
            Ok(state
                .withdrawals
                .iter()
                .any(|w| w.user == user && w.nonce == nonce))
        }

        async fn latest_block(&self) -> Result<u64> {
            Ok(self.state.lock().expect("mock chain poisoned").block)
        }
    }
}

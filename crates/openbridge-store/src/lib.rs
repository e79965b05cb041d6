//! # openbridge-store
//!
//! The storage substrate of OpenBridge: the replicated-store capability
//! trait, the frozen-entry store built on top of it, and the concurrency
//! primitives the ledger leans on.
//!
//! ## Architecture
//!
//! 1. **`ReplicatedStore`**: the capability the external graph store is
//!    consumed through — key-path addressed, multi-writer, last-writer-wins,
//!    eventually consistent, no read-after-write guarantee.
//! 2. **`FrozenEntryStore`**: append-only, signed, content-addressed records
//!    plus the single mutable index pointer per key. Verification on read
//!    fails closed; an unverified entry is indistinguishable from an absent
//!    one.
//! 3. **`KeyedMutex`**: per-key advisory locks (process-local only).
//! 4. **`TtlCell`**: a single-value TTL cache for data that changes rarely.

#![allow(async_fn_in_trait)]

pub mod frozen;
pub mod keyed_mutex;
pub mod replicated;
pub mod ttl_cell;

pub use frozen::{EntryRead, FrozenEntryStore, TrustedSigners};
pub use keyed_mutex::KeyedMutex;
pub use replicated::{MemoryStore, ReplicatedStore};
pub use ttl_cell::{CacheStats, TtlCell};

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pluggable persistence for the ledger gateway.
//!
//! [`DatabaseAdapter`] is the exact operation set the core requires; every
//! deployment plugs in an implementation (the hosted variant is relational,
//! the test suite and self-hosted mode run on [`MemoryStore`]).  Writes are
//! the only inter-request coordination mechanism, so the contract points
//! that need atomicity — one-time-code validation, batch entity upserts —
//! are single critical sections here.

#![deny(unsafe_code)]

pub mod adapter;
pub mod memory;
pub mod sie_record;

pub use adapter::{ConsentFilter, DatabaseAdapter, EntityQuery, StoreError, SyncStatePatch};
pub use memory::MemoryStore;
pub use sie_record::{SieRecord, SieUploadMeta};

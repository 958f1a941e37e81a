// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical data model for the ledger gateway.
//!
//! This crate holds everything the rest of the workspace agrees on: the
//! vendor tags and their capability table, the closed resource/entity enums,
//! the normalized DTO set with its `_raw` escape hatch, the consent model and
//! its state machine, the synced-entity records, pagination envelopes, and
//! the canonical-JSON content hash used for change detection.

#![deny(unsafe_code)]

pub mod consent;
pub mod dto;
pub mod entity;
pub mod hash;
pub mod page;
pub mod provider;
pub mod resource;

pub use consent::{ApiKey, Connection, Consent, ConsentStatus, ConsentToken, OneTimeCode};
pub use dto::{
    AccountKind, AccountingAccount, CanonicalDto, CompanyInformation, Customer, CustomerKind,
    DocumentStatus, Journal, JournalEntry, Money, Payment, SalesInvoice, Supplier, SupplierInvoice,
};
pub use entity::{
    CanonicalEntityRecord, EntitySyncResult, SieSyncResult, SyncJobStatus, SyncProgress, SyncState,
    UpsertSummary,
};
pub use hash::{canonical_json, content_hash};
pub use page::{ListQuery, PaginatedResponse};
pub use provider::{AuthFlow, Provider, VendorCapabilities};
pub use resource::{EntityType, ResourceType};

// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `DatabaseAdapter` trait: the exact operation set the core requires.

use crate::sie_record::{SieRecord, SieUploadMeta};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lgw_core::{
    ApiKey, CanonicalEntityRecord, Connection, Consent, ConsentStatus, ConsentToken, EntityType,
    OneTimeCode, Provider, SyncProgress, SyncState, UpsertSummary,
};
use lgw_error::{ErrorCode, GatewayError};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Adapter-level failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness or foreign-key style conflict.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// The backing database failed.
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::new(ErrorCode::StoreFailed, err.to_string())
    }
}

/// Result alias for adapter operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Filters for listing consents within a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsentFilter {
    /// Restrict to one vendor.
    pub provider: Option<Provider>,
    /// Restrict to one lifecycle state.
    pub status: Option<ConsentStatus>,
}

/// Query options for reading canonical entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQuery {
    /// 1-based page; `None` reads everything.
    pub page: Option<u32>,
    /// Page size; defaults to 50 when paging.
    pub page_size: Option<u32>,
    /// Restrict to one fiscal year.
    pub fiscal_year: Option<i32>,
    /// Document date lower bound (inclusive).
    pub from_date: Option<chrono::NaiveDate>,
    /// Document date upper bound (inclusive).
    pub to_date: Option<chrono::NaiveDate>,
}

/// Partial update of a [`SyncState`] row; `None` fields keep their stored
/// value, counter fields are added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatePatch {
    /// Owning connection.
    pub connection_id: Uuid,
    /// Entity type.
    pub entity_type: EntityType,
    /// New last-sync instant.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// New modified cursor.
    pub last_modified_cursor: Option<DateTime<Utc>>,
    /// Rows inserted by the run being recorded.
    pub add_inserted: u64,
    /// Rows updated by the run being recorded.
    pub add_updated: u64,
    /// Rows unchanged in the run being recorded.
    pub add_unchanged: u64,
    /// Error to record; `Some(None)` clears the stored error.
    pub last_error: Option<Option<String>>,
}

// ---------------------------------------------------------------------------
// DatabaseAdapter
// ---------------------------------------------------------------------------

/// Pluggable persistence seam.
///
/// Ownership rules are enforced here: deleting a connection cascades to its
/// entities, sync state, progress records, and SIE data; deleting a consent
/// cascades to its tokens and one-time codes.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    // -- Connections -----------------------------------------------------

    /// Insert or replace a connection by id.
    async fn upsert_connection(&self, connection: Connection) -> StoreResult<()>;

    /// Read one connection.
    async fn get_connection(&self, connection_id: Uuid) -> StoreResult<Option<Connection>>;

    /// List connections, optionally restricted to one vendor.
    async fn get_connections(&self, provider: Option<Provider>) -> StoreResult<Vec<Connection>>;

    /// Delete a connection and everything it owns.  Returns whether a row
    /// existed.
    async fn delete_connection(&self, connection_id: Uuid) -> StoreResult<bool>;

    // -- Canonical entities ----------------------------------------------

    /// Batch upsert with content-hash change detection.
    ///
    /// Rows compare by `(connectionId, entityType, externalId)`: absent rows
    /// insert, hash-equal rows count as unchanged without a write, the rest
    /// update.  The whole batch is one transaction where the backend
    /// supports it.
    async fn upsert_entities(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
        entities: Vec<CanonicalEntityRecord>,
    ) -> StoreResult<UpsertSummary>;

    /// Read entities with paging and date filters, ordered by document date
    /// descending then external id.
    async fn get_entities(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
        query: EntityQuery,
    ) -> StoreResult<Vec<CanonicalEntityRecord>>;

    /// Count entities for a `(connection, entityType)` pair.
    async fn get_entity_count(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
    ) -> StoreResult<u64>;

    // -- Sync state & progress -------------------------------------------

    /// Read the sync state for a `(connection, entityType)` pair.
    async fn get_sync_state(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
    ) -> StoreResult<Option<SyncState>>;

    /// Merge a partial update into the sync state, creating the row when
    /// absent.  Returns the stored row.
    async fn update_sync_state(&self, patch: SyncStatePatch) -> StoreResult<SyncState>;

    /// Insert or replace a progress record by job id (last write wins).
    async fn upsert_sync_progress(&self, progress: SyncProgress) -> StoreResult<()>;

    /// Read one progress record.
    async fn get_sync_progress(&self, job_id: Uuid) -> StoreResult<Option<SyncProgress>>;

    /// Recent progress records for a connection, newest first.
    async fn get_sync_history(
        &self,
        connection_id: Uuid,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SyncProgress>>;

    // -- SIE -------------------------------------------------------------

    /// Store an SIE record, overwriting any previous record with the same
    /// `(connectionId, fiscalYear, sieType)` scope.
    async fn store_sie_data(&self, record: SieRecord) -> StoreResult<()>;

    /// Listing views of a connection's stored SIE files, newest first.
    async fn get_sie_uploads(&self, connection_id: Uuid) -> StoreResult<Vec<SieUploadMeta>>;

    /// Read one stored SIE file by upload id.
    async fn get_sie_data(
        &self,
        connection_id: Uuid,
        upload_id: Uuid,
    ) -> StoreResult<Option<SieRecord>>;

    // -- Consents ---------------------------------------------------------

    /// Insert or replace a consent by id.
    async fn upsert_consent(&self, consent: Consent) -> StoreResult<()>;

    /// Read one consent.
    async fn get_consent(&self, consent_id: Uuid) -> StoreResult<Option<Consent>>;

    /// List a tenant's consents with optional filters.
    async fn get_consents(
        &self,
        tenant_id: &str,
        filter: ConsentFilter,
    ) -> StoreResult<Vec<Consent>>;

    /// List every consent in one lifecycle state, across tenants (purge
    /// sweep).
    async fn get_consents_by_status(&self, status: ConsentStatus) -> StoreResult<Vec<Consent>>;

    /// Delete a consent, its tokens, and its one-time codes.  Returns
    /// whether a row existed.
    async fn delete_consent(&self, consent_id: Uuid) -> StoreResult<bool>;

    // -- Consent tokens ---------------------------------------------------

    /// Insert or replace the token row for a consent.
    async fn store_consent_tokens(&self, token: ConsentToken) -> StoreResult<()>;

    /// Read the token row for a consent.
    async fn get_consent_tokens(&self, consent_id: Uuid) -> StoreResult<Option<ConsentToken>>;

    /// Delete the token row for a consent.  Returns whether a row existed.
    async fn delete_consent_tokens(&self, consent_id: Uuid) -> StoreResult<bool>;

    /// Token rows whose expiry falls before `cutoff` (refresh sweep).
    async fn get_tokens_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<ConsentToken>>;

    // -- One-time codes ---------------------------------------------------

    /// Persist a freshly generated code.
    async fn create_one_time_code(&self, otc: OneTimeCode) -> StoreResult<()>;

    /// Atomic check-and-mark: when the code exists, is unexpired, and
    /// unused, set `usedAt` and return the row; otherwise `None`.  A second
    /// validation of the same code must return `None`.
    async fn validate_one_time_code(&self, code: &str) -> StoreResult<Option<OneTimeCode>>;

    // -- API keys ----------------------------------------------------------

    /// Insert or replace an API key by hash.
    async fn upsert_api_key(&self, key: ApiKey) -> StoreResult<()>;

    /// O(1) lookup by SHA-256 hex digest.
    async fn get_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKey>>;
}

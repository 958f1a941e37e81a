// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory adapter used by the test suite and self-hosted mode.
//!
//! One `RwLock` over the whole state: every adapter operation is a single
//! critical section, which is what makes the one-time-code validation and
//! the batch upsert atomic without further machinery.

use crate::adapter::{
    ConsentFilter, DatabaseAdapter, EntityQuery, StoreError, StoreResult, SyncStatePatch,
};
use crate::sie_record::{SieRecord, SieUploadMeta};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lgw_core::{
    ApiKey, CanonicalEntityRecord, Connection, Consent, ConsentStatus, ConsentToken, EntityType,
    OneTimeCode, Provider, SyncProgress, SyncState, UpsertSummary,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    connections: HashMap<Uuid, Connection>,
    entities: HashMap<(Uuid, EntityType), BTreeMap<String, CanonicalEntityRecord>>,
    sync_states: HashMap<(Uuid, EntityType), SyncState>,
    progress: HashMap<Uuid, SyncProgress>,
    sie: HashMap<Uuid, SieRecord>,
    consents: HashMap<Uuid, Consent>,
    tokens: HashMap<Uuid, ConsentToken>,
    otcs: HashMap<String, OneTimeCode>,
    api_keys: HashMap<String, ApiKey>,
}

/// In-memory [`DatabaseAdapter`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Fresh empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseAdapter for MemoryStore {
    // -- Connections -----------------------------------------------------

    async fn upsert_connection(&self, connection: Connection) -> StoreResult<()> {
        self.state
            .write()
            .await
            .connections
            .insert(connection.connection_id, connection);
        Ok(())
    }

    async fn get_connection(&self, connection_id: Uuid) -> StoreResult<Option<Connection>> {
        Ok(self.state.read().await.connections.get(&connection_id).cloned())
    }

    async fn get_connections(&self, provider: Option<Provider>) -> StoreResult<Vec<Connection>> {
        let state = self.state.read().await;
        let mut out: Vec<Connection> = state
            .connections
            .values()
            .filter(|c| provider.is_none_or(|p| c.provider == p))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn delete_connection(&self, connection_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let existed = state.connections.remove(&connection_id).is_some();
        state.entities.retain(|(conn, _), _| *conn != connection_id);
        state.sync_states.retain(|(conn, _), _| *conn != connection_id);
        state.progress.retain(|_, p| p.connection_id != connection_id);
        state.sie.retain(|_, r| r.connection_id != connection_id);
        Ok(existed)
    }

    // -- Canonical entities ----------------------------------------------

    async fn upsert_entities(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
        entities: Vec<CanonicalEntityRecord>,
    ) -> StoreResult<UpsertSummary> {
        let mut state = self.state.write().await;
        let table = state
            .entities
            .entry((connection_id, entity_type))
            .or_default();
        let mut summary = UpsertSummary::default();
        for entity in entities {
            match table.get(&entity.external_id) {
                None => {
                    table.insert(entity.external_id.clone(), entity);
                    summary.inserted += 1;
                }
                Some(existing) if existing.content_hash == entity.content_hash => {
                    summary.unchanged += 1;
                }
                Some(_) => {
                    table.insert(entity.external_id.clone(), entity);
                    summary.updated += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn get_entities(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
        query: EntityQuery,
    ) -> StoreResult<Vec<CanonicalEntityRecord>> {
        let state = self.state.read().await;
        let mut rows: Vec<CanonicalEntityRecord> = state
            .entities
            .get(&(connection_id, entity_type))
            .map(|table| {
                table
                    .values()
                    .filter(|e| query.fiscal_year.is_none_or(|y| e.fiscal_year == Some(y)))
                    .filter(|e| {
                        query
                            .from_date
                            .is_none_or(|from| e.document_date.is_some_and(|d| d >= from))
                    })
                    .filter(|e| {
                        query
                            .to_date
                            .is_none_or(|to| e.document_date.is_some_and(|d| d <= to))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Newest documents first; rows without a date sort last, then by id.
        rows.sort_by(|a, b| {
            b.document_date
                .cmp(&a.document_date)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });

        if let Some(page) = query.page {
            let page = page.max(1) as usize;
            let page_size = query.page_size.unwrap_or(50).max(1) as usize;
            rows = rows
                .into_iter()
                .skip((page - 1) * page_size)
                .take(page_size)
                .collect();
        }
        Ok(rows)
    }

    async fn get_entity_count(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
    ) -> StoreResult<u64> {
        Ok(self
            .state
            .read()
            .await
            .entities
            .get(&(connection_id, entity_type))
            .map(|t| t.len() as u64)
            .unwrap_or(0))
    }

    // -- Sync state & progress -------------------------------------------

    async fn get_sync_state(
        &self,
        connection_id: Uuid,
        entity_type: EntityType,
    ) -> StoreResult<Option<SyncState>> {
        Ok(self
            .state
            .read()
            .await
            .sync_states
            .get(&(connection_id, entity_type))
            .cloned())
    }

    async fn update_sync_state(&self, patch: SyncStatePatch) -> StoreResult<SyncState> {
        let mut state = self.state.write().await;
        let row = state
            .sync_states
            .entry((patch.connection_id, patch.entity_type))
            .or_insert_with(|| SyncState::empty(patch.connection_id, patch.entity_type));
        if let Some(at) = patch.last_sync_at {
            row.last_sync_at = Some(at);
        }
        if let Some(cursor) = patch.last_modified_cursor {
            row.last_modified_cursor = Some(cursor);
        }
        row.total_inserted += patch.add_inserted;
        row.total_updated += patch.add_updated;
        row.total_unchanged += patch.add_unchanged;
        if let Some(error) = patch.last_error {
            row.last_error = error;
        }
        Ok(row.clone())
    }

    async fn upsert_sync_progress(&self, progress: SyncProgress) -> StoreResult<()> {
        self.state
            .write()
            .await
            .progress
            .insert(progress.job_id, progress);
        Ok(())
    }

    async fn get_sync_progress(&self, job_id: Uuid) -> StoreResult<Option<SyncProgress>> {
        Ok(self.state.read().await.progress.get(&job_id).cloned())
    }

    async fn get_sync_history(
        &self,
        connection_id: Uuid,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SyncProgress>> {
        let state = self.state.read().await;
        let mut rows: Vec<SyncProgress> = state
            .progress
            .values()
            .filter(|p| p.connection_id == connection_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    // -- SIE -------------------------------------------------------------

    async fn store_sie_data(&self, record: SieRecord) -> StoreResult<()> {
        let mut state = self.state.write().await;
        // Overwrite semantics on (connection, fiscalYear, sieType).
        state.sie.retain(|_, existing| {
            !(existing.connection_id == record.connection_id
                && existing.fiscal_year == record.fiscal_year
                && existing.sie_type == record.sie_type)
        });
        state.sie.insert(record.upload_id, record);
        Ok(())
    }

    async fn get_sie_uploads(&self, connection_id: Uuid) -> StoreResult<Vec<SieUploadMeta>> {
        let state = self.state.read().await;
        let mut rows: Vec<SieUploadMeta> = state
            .sie
            .values()
            .filter(|r| r.connection_id == connection_id)
            .map(SieRecord::meta)
            .collect();
        rows.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(rows)
    }

    async fn get_sie_data(
        &self,
        connection_id: Uuid,
        upload_id: Uuid,
    ) -> StoreResult<Option<SieRecord>> {
        Ok(self
            .state
            .read()
            .await
            .sie
            .get(&upload_id)
            .filter(|r| r.connection_id == connection_id)
            .cloned())
    }

    // -- Consents ---------------------------------------------------------

    async fn upsert_consent(&self, consent: Consent) -> StoreResult<()> {
        self.state.write().await.consents.insert(consent.id, consent);
        Ok(())
    }

    async fn get_consent(&self, consent_id: Uuid) -> StoreResult<Option<Consent>> {
        Ok(self.state.read().await.consents.get(&consent_id).cloned())
    }

    async fn get_consents(
        &self,
        tenant_id: &str,
        filter: ConsentFilter,
    ) -> StoreResult<Vec<Consent>> {
        let state = self.state.read().await;
        let mut rows: Vec<Consent> = state
            .consents
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| filter.provider.is_none_or(|p| c.provider == p))
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get_consents_by_status(&self, status: ConsentStatus) -> StoreResult<Vec<Consent>> {
        let state = self.state.read().await;
        Ok(state
            .consents
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect())
    }

    async fn delete_consent(&self, consent_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let existed = state.consents.remove(&consent_id).is_some();
        state.tokens.remove(&consent_id);
        state.otcs.retain(|_, otc| otc.consent_id != consent_id);
        Ok(existed)
    }

    // -- Consent tokens ---------------------------------------------------

    async fn store_consent_tokens(&self, token: ConsentToken) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.consents.contains_key(&token.consent_id) {
            return Err(StoreError::Conflict(format!(
                "no consent {} for token row",
                token.consent_id
            )));
        }
        state.tokens.insert(token.consent_id, token);
        Ok(())
    }

    async fn get_consent_tokens(&self, consent_id: Uuid) -> StoreResult<Option<ConsentToken>> {
        Ok(self.state.read().await.tokens.get(&consent_id).cloned())
    }

    async fn delete_consent_tokens(&self, consent_id: Uuid) -> StoreResult<bool> {
        Ok(self.state.write().await.tokens.remove(&consent_id).is_some())
    }

    async fn get_tokens_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<ConsentToken>> {
        let state = self.state.read().await;
        Ok(state
            .tokens
            .values()
            .filter(|t| t.token_expires_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect())
    }

    // -- One-time codes ---------------------------------------------------

    async fn create_one_time_code(&self, otc: OneTimeCode) -> StoreResult<()> {
        self.state.write().await.otcs.insert(otc.code.clone(), otc);
        Ok(())
    }

    async fn validate_one_time_code(&self, code: &str) -> StoreResult<Option<OneTimeCode>> {
        // Check-and-mark under the write lock: a second caller sees used_at.
        let mut state = self.state.write().await;
        let now = Utc::now();
        let Some(otc) = state.otcs.get_mut(code) else {
            return Ok(None);
        };
        if otc.used_at.is_some() || otc.expires_at < now {
            return Ok(None);
        }
        otc.used_at = Some(now);
        Ok(Some(otc.clone()))
    }

    // -- API keys ----------------------------------------------------------

    async fn upsert_api_key(&self, key: ApiKey) -> StoreResult<()> {
        self.state
            .write()
            .await
            .api_keys
            .insert(key.key_hash.clone(), key);
        Ok(())
    }

    async fn get_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        Ok(self.state.read().await.api_keys.get(key_hash).cloned())
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! The sync engine: cursor-driven batch pull of vendor entities into the
//! canonical store, with content-hash change detection and per-entity-type
//! cursors.
//!
//! Entity types run sequentially to keep per-vendor rate-limit pressure
//! predictable; SIE files for multiple fiscal years fetch concurrently,
//! bounded by the vendor's token bucket.  A failure in one entity type is
//! captured in the progress record and does not abort the others.

#![deny(unsafe_code)]

pub mod plan;
pub mod record;

use chrono::Utc;
use futures::future::join_all;
use lgw_core::{
    EntitySyncResult, EntityType, ListQuery, Provider, SieSyncResult, SyncProgress,
};
use lgw_error::{GatewayError, Result};
use lgw_gateway::Gateway;
use lgw_sie::{compute_kpis, decode_sie_bytes, parse_sie};
use lgw_store::{DatabaseAdapter, SieRecord, SyncStatePatch};
use lgw_vendor::AccessCredentials;
use plan::{fetch_plan, sie_export_path};
use record::build_record;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SyncJob
// ---------------------------------------------------------------------------

/// Options for the SIE leg of a sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SieOptions {
    /// Fiscal years to fetch; defaults to the current calendar year.
    pub fiscal_years: Vec<i32>,
    /// SIE type to request (4 carries transactions).
    pub sie_type: u8,
}

impl Default for SieOptions {
    fn default() -> Self {
        Self {
            fiscal_years: vec![chrono::Datelike::year(&Utc::now())],
            sie_type: 4,
        }
    }
}

/// One sync job.
#[derive(Debug, Clone)]
pub struct SyncJob {
    /// Connection whose store the job fills.
    pub connection_id: Uuid,
    /// Backing vendor.
    pub provider: Provider,
    /// Decrypted vendor credentials.
    pub credentials: AccessCredentials,
    /// Restrict to these entity types; `None` means every supported type.
    pub entity_types: Option<Vec<EntityType>>,
    /// Also fetch SIE files, for vendors that export them.
    pub include_sie: bool,
    /// SIE leg options.
    pub sie_options: Option<SieOptions>,
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// Executes sync jobs against the gateway and the store.
pub struct SyncEngine {
    store: Arc<dyn DatabaseAdapter>,
    gateway: Arc<Gateway>,
}

impl SyncEngine {
    /// Wire up the engine.
    pub fn new(store: Arc<dyn DatabaseAdapter>, gateway: Arc<Gateway>) -> Self {
        Self { store, gateway }
    }

    /// Run one job to completion and return the final progress record.
    ///
    /// The record is persisted at start, after every entity type, and at
    /// finalization, so observers polling the progress endpoint see the
    /// job advance.
    pub async fn execute_sync(&self, job: SyncJob) -> Result<SyncProgress> {
        self.execute_sync_with_id(Uuid::new_v4(), job).await
    }

    /// [`Self::execute_sync`] with a caller-chosen job id, so the HTTP
    /// surface can answer `{jobId}` before the spawned job finishes.
    pub async fn execute_sync_with_id(
        &self,
        job_id: Uuid,
        job: SyncJob,
    ) -> Result<SyncProgress> {
        let mut progress = SyncProgress::start(job_id, job.connection_id, job.provider);
        self.store.upsert_sync_progress(progress.clone()).await?;

        let capabilities = job.provider.capabilities();
        let effective_types: Vec<EntityType> = match &job.entity_types {
            Some(requested) => requested
                .iter()
                .copied()
                .filter(|t| capabilities.supports_entity(*t))
                .collect(),
            None => capabilities.supported_entity_types.to_vec(),
        };

        let include_sie = job.include_sie && capabilities.supports_sie;
        let total_steps = effective_types.len() + usize::from(include_sie);
        info!(
            job_id = %job_id,
            provider = %job.provider,
            types = effective_types.len(),
            include_sie,
            "sync job started"
        );

        for (step, entity_type) in effective_types.iter().enumerate() {
            let result = self
                .sync_entity_type(&job, *entity_type)
                .await
                .unwrap_or_else(|err| EntitySyncResult {
                    entity_type: *entity_type,
                    success: false,
                    fetched: 0,
                    inserted: 0,
                    updated: 0,
                    unchanged: 0,
                    error: Some(err.to_string()),
                });
            if !result.success {
                warn!(
                    job_id = %job_id,
                    entity_type = %entity_type,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "entity sync failed"
                );
            }
            progress.entity_results.push(result);
            progress.progress =
                (((step + 1) * 100) / total_steps.max(1)).min(99) as u8;
            self.store.upsert_sync_progress(progress.clone()).await?;
        }

        if include_sie {
            progress.sie_result = Some(self.sync_sie(&job).await);
            self.store.upsert_sync_progress(progress.clone()).await?;
        }

        progress.finalize();
        self.store.upsert_sync_progress(progress.clone()).await?;

        if let Some(mut connection) = self.store.get_connection(job.connection_id).await? {
            connection.last_sync_at = progress.finished_at;
            connection.updated_at = Utc::now();
            self.store.upsert_connection(connection).await?;
        }

        info!(job_id = %job_id, status = ?progress.status, "sync job finished");
        Ok(progress)
    }

    // -- Entity types ------------------------------------------------------

    async fn sync_entity_type(
        &self,
        job: &SyncJob,
        entity_type: EntityType,
    ) -> Result<EntitySyncResult> {
        let plan = fetch_plan(job.provider, entity_type).ok_or_else(|| {
            GatewayError::internal(format!(
                "capability table and fetch plan disagree on {entity_type}"
            ))
        })?;

        let state = self
            .store
            .get_sync_state(job.connection_id, entity_type)
            .await?;
        let cursor = state.and_then(|s| s.last_modified_cursor);

        let query = ListQuery {
            page_size: 100,
            modified_since: cursor.filter(|_| plan.supports_modified),
            ..Default::default()
        };
        let raw_rows = if plan.singleton {
            let body = self
                .gateway
                .fetch_value_path(job.provider, &job.credentials, plan.path)
                .await?;
            let inner = match plan.detail_key {
                Some(key) => body.get(key).cloned().unwrap_or(body),
                None => body,
            };
            vec![inner]
        } else {
            self.gateway
                .fetch_all_path(
                    job.provider,
                    &job.credentials,
                    plan.path,
                    plan.list_key,
                    &query,
                )
                .await?
        };

        let fetched = raw_rows.len();
        let mut records = Vec::with_capacity(fetched);
        for raw in raw_rows {
            if let Some(record) = build_record(job.provider, entity_type, &plan, raw) {
                records.push(record);
            }
        }

        let new_cursor = records
            .iter()
            .filter_map(|r| r.last_modified)
            .max()
            .map(|seen| cursor.map_or(seen, |existing| existing.max(seen)));

        let summary = self
            .store
            .upsert_entities(job.connection_id, entity_type, records)
            .await?;

        self.store
            .update_sync_state(SyncStatePatch {
                connection_id: job.connection_id,
                entity_type,
                last_sync_at: Some(Utc::now()),
                last_modified_cursor: new_cursor,
                add_inserted: summary.inserted as u64,
                add_updated: summary.updated as u64,
                add_unchanged: summary.unchanged as u64,
                last_error: Some(None),
            })
            .await?;

        Ok(EntitySyncResult {
            entity_type,
            success: true,
            fetched,
            inserted: summary.inserted,
            updated: summary.updated,
            unchanged: summary.unchanged,
            error: None,
        })
    }

    // -- SIE ---------------------------------------------------------------

    /// Fetch, decode, parse, and store SIE files for the years in scope.
    /// Failures aggregate into one result and never fail the job.
    async fn sync_sie(&self, job: &SyncJob) -> SieSyncResult {
        let options = job.sie_options.clone().unwrap_or_default();
        let sie_type = options.sie_type;
        let fetches = options.fiscal_years.iter().map(|year| {
            let year = *year;
            async move {
                let path = sie_export_path(job.provider, year, sie_type)
                    .ok_or_else(|| {
                        GatewayError::internal(format!(
                            "no SIE export path for '{}'",
                            job.provider
                        ))
                    })?;
                let bytes = self
                    .gateway
                    .fetch_binary(job.provider, &job.credentials, &path)
                    .await?;
                let text = decode_sie_bytes(&bytes)
                    .map_err(|e| GatewayError::validation(format!("SIE decode failed: {e}")))?;
                let doc = parse_sie(&text)
                    .map_err(|e| GatewayError::validation(format!("SIE parse failed: {e}")))?;
                let kpis = compute_kpis(&doc);
                let record = SieRecord::new(job.connection_id, None, doc, kpis);
                let stored_year = record.fiscal_year;
                self.store.store_sie_data(record).await?;
                Ok::<i32, GatewayError>(stored_year)
            }
        });

        let outcomes = join_all(fetches).await;
        let mut years = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(year) => years.push(year),
                Err(err) => errors.push(err.to_string()),
            }
        }
        SieSyncResult {
            success: errors.is_empty(),
            files: years.len(),
            years,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }
}

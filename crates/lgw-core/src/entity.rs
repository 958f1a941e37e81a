// SPDX-License-Identifier: MIT OR Apache-2.0
//! Synced-entity records and sync bookkeeping types.

use crate::hash::content_hash;
use crate::provider::Provider;
use crate::resource::EntityType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CanonicalEntityRecord
// ---------------------------------------------------------------------------

/// Provider-agnostic normalized row in the canonical store.
///
/// Unique per `(connectionId, entityType, externalId)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEntityRecord {
    /// Vendor-scoped identifier of the source record.
    pub external_id: String,
    /// Entity classification.
    pub entity_type: EntityType,
    /// Vendor the record came from.
    pub provider: Provider,
    /// Fiscal year the record belongs to, where derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    /// Document date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_date: Option<NaiveDate>,
    /// Due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Counterparty register number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty_number: Option<String>,
    /// Counterparty display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty_name: Option<String>,
    /// Monetary amount, where the entity has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Currency code; defaults to `SEK`.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Normalized status string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Original vendor payload.
    pub raw_data: Value,
    /// Vendor-reported last-modified instant, used for cursor advancement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// SHA-256 over the key-sorted rendering of `raw_data`.
    pub content_hash: String,
}

fn default_currency() -> String {
    "SEK".into()
}

impl CanonicalEntityRecord {
    /// Build a record, computing `content_hash` from `raw_data`.
    pub fn new(
        external_id: impl Into<String>,
        entity_type: EntityType,
        provider: Provider,
        raw_data: Value,
    ) -> Self {
        let content_hash = content_hash(&raw_data);
        Self {
            external_id: external_id.into(),
            entity_type,
            provider,
            fiscal_year: None,
            document_date: None,
            due_date: None,
            counterparty_number: None,
            counterparty_name: None,
            amount: None,
            currency: default_currency(),
            status: None,
            raw_data,
            last_modified: None,
            content_hash,
        }
    }

    /// Recompute `content_hash` after `raw_data` was replaced.
    pub fn rehash(&mut self) {
        self.content_hash = content_hash(&self.raw_data);
    }
}

// ---------------------------------------------------------------------------
// UpsertSummary
// ---------------------------------------------------------------------------

/// Outcome counters of a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    /// Rows that did not exist before.
    pub inserted: usize,
    /// Rows whose content hash changed.
    pub updated: usize,
    /// Rows whose content hash was unchanged (no write issued).
    pub unchanged: usize,
}

impl UpsertSummary {
    /// Fold another summary into this one.
    pub fn merge(&mut self, other: UpsertSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }

    /// Total rows examined.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

// ---------------------------------------------------------------------------
// SyncState
// ---------------------------------------------------------------------------

/// Per `(connection, entityType)` sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Owning connection.
    pub connection_id: Uuid,
    /// Entity type this state tracks.
    pub entity_type: EntityType,
    /// When this type last finished syncing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// High-water mark of `lastModified` seen so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_cursor: Option<DateTime<Utc>>,
    /// Cumulative inserted rows.
    #[serde(default)]
    pub total_inserted: u64,
    /// Cumulative updated rows.
    #[serde(default)]
    pub total_updated: u64,
    /// Cumulative unchanged rows.
    #[serde(default)]
    pub total_unchanged: u64,
    /// Last error message, if the most recent attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncState {
    /// Empty state for a `(connection, entityType)` pair.
    pub fn empty(connection_id: Uuid, entity_type: EntityType) -> Self {
        Self {
            connection_id,
            entity_type,
            last_sync_at: None,
            last_modified_cursor: None,
            total_inserted: 0,
            total_updated: 0,
            total_unchanged: 0,
            last_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SyncProgress
// ---------------------------------------------------------------------------

/// Job status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    /// Queued, not yet started.
    Pending,
    /// In flight.
    Running,
    /// Finished; at least one entity type succeeded (or there were none).
    Completed,
    /// Finished; every attempted entity type failed.
    Failed,
}

impl SyncJobStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-entity-type outcome inside a sync job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncResult {
    /// Entity type this result covers.
    pub entity_type: EntityType,
    /// Whether the pull for this type succeeded.
    pub success: bool,
    /// Rows fetched from the vendor.
    pub fetched: usize,
    /// Rows inserted.
    pub inserted: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows unchanged.
    pub unchanged: usize,
    /// Error message when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated SIE outcome inside a sync job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieSyncResult {
    /// Whether every fetched file was stored.
    pub success: bool,
    /// Fiscal years that produced a stored file.
    pub years: Vec<i32>,
    /// Number of files stored.
    pub files: usize,
    /// Error message when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Progress record for one sync job.  Append-only, last-write-wins on
/// `jobId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    /// Job identifier.
    pub job_id: Uuid,
    /// Connection the job syncs.
    pub connection_id: Uuid,
    /// Backing vendor.
    pub provider: Provider,
    /// Job status.
    pub status: SyncJobStatus,
    /// Integer progress 0..=100.
    pub progress: u8,
    /// One summary per attempted entity type.
    #[serde(default)]
    pub entity_results: Vec<EntitySyncResult>,
    /// Aggregated SIE outcome, when SIE was in scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sie_result: Option<SieSyncResult>,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Total wall-clock duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl SyncProgress {
    /// Fresh running record at progress 0.
    pub fn start(job_id: Uuid, connection_id: Uuid, provider: Provider) -> Self {
        Self {
            job_id,
            connection_id,
            provider,
            status: SyncJobStatus::Running,
            progress: 0,
            entity_results: Vec::new(),
            sie_result: None,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
        }
    }

    /// Finalize per §4.9: failed iff every per-type result failed and there
    /// was at least one; progress forced to 100.
    pub fn finalize(&mut self) {
        let any = !self.entity_results.is_empty();
        let all_failed = any && self.entity_results.iter().all(|r| !r.success);
        self.status = if all_failed {
            SyncJobStatus::Failed
        } else {
            SyncJobStatus::Completed
        };
        self.progress = 100;
        let finished = Utc::now();
        self.duration_ms = Some(
            (finished - self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.finished_at = Some(finished);
    }
}

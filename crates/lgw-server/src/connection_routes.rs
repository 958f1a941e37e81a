// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection and sync routes.

use crate::AppState;
use crate::auth::AuthTenant;
use crate::error::{ApiResult, AppError};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use lgw_core::{
    CanonicalEntityRecord, Connection, EntityType, PaginatedResponse, Provider,
};
use lgw_error::GatewayError;
use lgw_store::EntityQuery;
use lgw_sync::{SieOptions, SyncJob};
use lgw_vendor::AccessCredentials;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    provider: Provider,
    display_name: String,
    #[serde(default)]
    organization_number: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

/// `POST /api/v1/connections`
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Json(body): Json<CreateConnectionRequest>,
) -> ApiResult<(StatusCode, Json<Connection>)> {
    let now = Utc::now();
    let connection = Connection {
        connection_id: Uuid::new_v4(),
        provider: body.provider,
        display_name: body.display_name,
        organization_number: body.organization_number,
        last_sync_at: None,
        created_at: now,
        updated_at: now,
        metadata: body.metadata.unwrap_or_else(|| json!({})),
    };
    state.store.upsert_connection(connection.clone()).await?;
    Ok((StatusCode::CREATED, Json(connection)))
}

#[derive(Debug, Deserialize)]
pub struct ListConnectionsQuery {
    provider: Option<String>,
}

/// `GET /api/v1/connections`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Query(query): Query<ListConnectionsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let provider = match query.provider.as_deref() {
        Some(tag) => Some(Provider::parse(tag).ok_or_else(|| {
            AppError(GatewayError::validation(format!("unknown provider '{tag}'")))
        })?),
        None => None,
    };
    let connections = state.store.get_connections(provider).await?;
    Ok(Json(json!({ "data": connections })))
}

/// `GET /api/v1/connections/{id}`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Connection>> {
    let connection = state
        .store
        .get_connection(id)
        .await?
        .ok_or_else(|| AppError(GatewayError::not_found(format!("connection {id} not found"))))?;
    Ok(Json(connection))
}

/// `DELETE /api/v1/connections/{id}` — cascades to entities, sync state,
/// progress, and SIE data.
pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.store.delete_connection(id).await? {
        return Err(AppError(GatewayError::not_found(format!(
            "connection {id} not found"
        ))));
    }
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSyncRequest {
    /// Consent whose credentials authorize the pull.
    consent_id: Uuid,
    #[serde(default)]
    entity_types: Option<Vec<EntityType>>,
    #[serde(default)]
    include_sie: Option<bool>,
    #[serde(default)]
    fiscal_years: Option<Vec<i32>>,
    #[serde(default)]
    sie_type: Option<u8>,
}

/// `POST /api/v1/connections/{id}/sync` — answers `{jobId}` immediately;
/// the job runs on a spawned task and is observable through the progress
/// endpoint.
pub async fn start_sync(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
    Json(body): Json<StartSyncRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let connection = state
        .store
        .get_connection(id)
        .await?
        .ok_or_else(|| AppError(GatewayError::not_found(format!("connection {id} not found"))))?;

    let access = state
        .consents
        .resolve_credentials(&tenant, body.consent_id, None)
        .await?;
    if access.consent.provider != connection.provider {
        return Err(AppError(GatewayError::validation(
            "consent and connection are bound to different vendors",
        )));
    }

    let credentials = AccessCredentials {
        access_token: access.token.access_token,
        company_id: access.token.company_id,
        client_id: state
            .config
            .vendor(connection.provider)
            .map(|v| v.client_id.clone()),
    };
    let sie_options = match (body.fiscal_years, body.sie_type) {
        (None, None) => None,
        (years, sie_type) => Some(SieOptions {
            fiscal_years: years.unwrap_or_else(|| SieOptions::default().fiscal_years),
            sie_type: sie_type.unwrap_or(4),
        }),
    };
    let job = SyncJob {
        connection_id: id,
        provider: connection.provider,
        credentials,
        entity_types: body.entity_types,
        include_sie: body.include_sie.unwrap_or(false),
        sie_options,
    };

    let job_id = Uuid::new_v4();
    let engine = Arc::clone(&state.sync);
    tokio::spawn(async move {
        if let Err(err) = engine.execute_sync_with_id(job_id, job).await {
            error!(job_id = %job_id, error = %err, "sync job crashed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "jobId": job_id }))))
}

/// `GET /api/v1/connections/{id}/sync/{job_id}`
pub async fn sync_progress(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Path((id, job_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<lgw_core::SyncProgress>> {
    let progress = state
        .store
        .get_sync_progress(job_id)
        .await?
        .filter(|p| p.connection_id == id)
        .ok_or_else(|| AppError(GatewayError::not_found(format!("job {job_id} not found"))))?;
    Ok(Json(progress))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

/// `GET /api/v1/connections/{id}/sync`
pub async fn sync_history(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let history = state.store.get_sync_history(id, query.limit).await?;
    Ok(Json(json!({ "data": history })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesQuery {
    page: Option<u32>,
    page_size: Option<u32>,
    fiscal_year: Option<i32>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
}

/// `GET /api/v1/connections/{id}/entities/{entity_type}` — served from the
/// canonical store, no vendor call.
pub async fn list_entities(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Path((id, entity_type)): Path<(Uuid, String)>,
    Query(query): Query<EntitiesQuery>,
) -> ApiResult<Json<PaginatedResponse<CanonicalEntityRecord>>> {
    let entity_type = EntityType::parse(&entity_type).ok_or_else(|| {
        AppError(GatewayError::validation(format!(
            "unknown entity type '{entity_type}'"
        )))
    })?;
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(50).max(1);

    let rows = state
        .store
        .get_entities(
            id,
            entity_type,
            EntityQuery {
                page: Some(page),
                page_size: Some(page_size),
                fiscal_year: query.fiscal_year,
                from_date: query.from_date,
                to_date: query.to_date,
            },
        )
        .await?;
    let total_count = state.store.get_entity_count(id, entity_type).await?;
    let total_pages = (total_count.div_ceil(page_size as u64)) as u32;

    Ok(Json(PaginatedResponse {
        has_more: page < total_pages,
        data: rows,
        page,
        page_size,
        total_count,
        total_pages: Some(total_pages),
    }))
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consent-scoped data-plane routes.
//!
//! Every handler resolves the consent into decrypted credentials first
//! (load → require Accepted → decrypt → on-path refresh → self-hosted
//! bearer fall-back), then dispatches through the gateway.  `_raw` is
//! stripped from every DTO before it crosses the wire.

use crate::AppState;
use crate::auth::{AuthTenant, extract_bearer};
use crate::error::{ApiResult, AppError};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use lgw_core::{CanonicalDto, ListQuery, PaginatedResponse, Provider, ResourceType};
use lgw_error::{ErrorCode, GatewayError};
use lgw_vendor::AccessCredentials;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPlaneQuery {
    page: Option<u32>,
    page_size: Option<u32>,
    modified_since: Option<DateTime<Utc>>,
    fiscal_year: Option<i32>,
    include_entries: Option<bool>,
}

impl DataPlaneQuery {
    fn into_list_query(self) -> ListQuery {
        let defaults = ListQuery::default();
        ListQuery {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            modified_since: self.modified_since,
            fiscal_year: self.fiscal_year,
            include_entries: self.include_entries.unwrap_or(false),
        }
    }
}

/// Resolve the consent and build vendor credentials for the request.
async fn resolve(
    state: &AppState,
    tenant: &str,
    consent_id: Uuid,
    headers: &HeaderMap,
) -> Result<(Provider, AccessCredentials), AppError> {
    let access = state
        .consents
        .resolve_credentials(tenant, consent_id, extract_bearer(headers))
        .await?;
    let provider = access.consent.provider;
    if !state.config.vendor_enabled(provider) {
        return Err(GatewayError::new(
            ErrorCode::VendorNotConfigured,
            format!("vendor '{provider}' is not configured in this deployment"),
        )
        .into());
    }
    let credentials = AccessCredentials {
        access_token: access.token.access_token,
        company_id: access.token.company_id,
        client_id: state
            .config
            .vendor(provider)
            .map(|v| v.client_id.clone()),
    };
    Ok((provider, credentials))
}

fn parse_resource(segment: &str) -> Result<ResourceType, AppError> {
    ResourceType::parse(segment).ok_or_else(|| {
        AppError(GatewayError::validation(format!(
            "unknown resource type '{segment}'"
        )))
    })
}

fn strip_page(mut page: PaginatedResponse<CanonicalDto>) -> PaginatedResponse<CanonicalDto> {
    for dto in &mut page.data {
        dto.strip_raw();
    }
    page
}

/// `GET /api/v1/consents/{id}/{resource_type}`
pub async fn list_resource(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path((consent_id, resource_type)): Path<(Uuid, String)>,
    Query(query): Query<DataPlaneQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<PaginatedResponse<CanonicalDto>>> {
    let resource = parse_resource(&resource_type)?;
    let (provider, credentials) = resolve(&state, &tenant, consent_id, &headers).await?;
    let page = state
        .gateway
        .list(provider, &credentials, resource, &query.into_list_query())
        .await?;
    Ok(Json(strip_page(page)))
}

/// `GET /api/v1/consents/{id}/{resource_type}/{resource_id}`
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path((consent_id, resource_type, resource_id)): Path<(Uuid, String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let resource = parse_resource(&resource_type)?;
    let (provider, credentials) = resolve(&state, &tenant, consent_id, &headers).await?;
    match state
        .gateway
        .get(provider, &credentials, resource, &resource_id)
        .await?
    {
        Some(mut dto) => {
            dto.strip_raw();
            Ok(Json(dto).into_response())
        }
        None => Err(GatewayError::not_found(format!(
            "{resource_type} '{resource_id}' not found"
        ))
        .into()),
    }
}

/// `POST /api/v1/consents/{id}/{resource_type}`
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path((consent_id, resource_type)): Path<(Uuid, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<CanonicalDto>)> {
    let resource = parse_resource(&resource_type)?;
    let (provider, credentials) = resolve(&state, &tenant, consent_id, &headers).await?;
    let mut dto = state
        .gateway
        .create(provider, &credentials, resource, &body)
        .await?;
    dto.strip_raw();
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `GET /api/v1/consents/{id}/{parent_type}/{parent_id}/{sub_type}`
pub async fn list_sub_resource(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path((consent_id, parent_type, parent_id, sub_type)): Path<(Uuid, String, String, String)>,
    Query(query): Query<DataPlaneQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<PaginatedResponse<CanonicalDto>>> {
    let parent = parse_resource(&parent_type)?;
    let (provider, credentials) = resolve(&state, &tenant, consent_id, &headers).await?;
    let page = state
        .gateway
        .list_sub(
            provider,
            &credentials,
            parent,
            &parent_id,
            &sub_type,
            &query.into_list_query(),
        )
        .await?;
    Ok(Json(strip_page(page)))
}

/// `POST /api/v1/consents/{id}/{parent_type}/{parent_id}/{sub_type}`
pub async fn create_sub_resource(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path((consent_id, parent_type, parent_id, sub_type)): Path<(Uuid, String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<CanonicalDto>)> {
    let parent = parse_resource(&parent_type)?;
    let (provider, credentials) = resolve(&state, &tenant, consent_id, &headers).await?;
    let mut dto = state
        .gateway
        .create_sub(
            provider,
            &credentials,
            parent,
            &parent_id,
            &sub_type,
            &body,
        )
        .await?;
    dto.strip_raw();
    Ok((StatusCode::CREATED, Json(dto)))
}

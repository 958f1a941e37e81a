// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consent control-plane routes.

use crate::AppState;
use crate::auth::AuthTenant;
use crate::error::{ApiResult, AppError};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use lgw_consent::{CreateConsentRequest, ExchangeTokenRequest, PatchConsentRequest};
use lgw_core::{Consent, ConsentStatus, Provider};
use lgw_error::GatewayError;
use lgw_store::ConsentFilter;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    // The SIE-upload pseudo-vendor is always enabled; only real
    // bookkeeping vendors count here.
    let enabled = Provider::ALL
        .iter()
        .filter(|p| **p != Provider::SieUpload && state.config.vendor_enabled(**p))
        .count();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "enabledVendors": enabled,
    }))
}

fn with_etag(status: StatusCode, consent: &Consent) -> Response {
    let mut response = (status, Json(consent.clone())).into_response();
    if let Ok(value) = consent.etag.parse() {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

fn if_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').to_owned())
}

/// `POST /api/v1/consents`
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Json(body): Json<CreateConsentRequest>,
) -> ApiResult<Response> {
    let consent = state.consents.create(&tenant, body).await?;
    Ok(with_etag(StatusCode::CREATED, &consent))
}

#[derive(Debug, Deserialize)]
pub struct ListConsentsQuery {
    provider: Option<String>,
    status: Option<u8>,
}

/// `GET /api/v1/consents?provider=&status=`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Query(query): Query<ListConsentsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let provider = match query.provider.as_deref() {
        Some(tag) => Some(Provider::parse(tag).ok_or_else(|| {
            AppError(GatewayError::validation(format!("unknown provider '{tag}'")))
        })?),
        None => None,
    };
    let status = match query.status {
        Some(value) => Some(
            ConsentStatus::try_from(value)
                .map_err(|e| AppError(GatewayError::validation(e)))?,
        ),
        None => None,
    };
    let consents = state
        .consents
        .list(&tenant, ConsentFilter { provider, status })
        .await?;
    Ok(Json(json!({ "data": consents })))
}

/// `GET /api/v1/consents/{id}`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let consent = state.consents.get(&tenant, id).await?;
    Ok(with_etag(StatusCode::OK, &consent))
}

/// `PATCH /api/v1/consents/{id}` — honors `If-Match`.
pub async fn patch_one(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<PatchConsentRequest>,
) -> ApiResult<Response> {
    let consent = state
        .consents
        .patch(&tenant, id, if_match(&headers).as_deref(), body)
        .await?;
    Ok(with_etag(StatusCode::OK, &consent))
}

/// `DELETE /api/v1/consents/{id}` — cascades to tokens and codes.
pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.consents.delete(&tenant, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// `POST /api/v1/consents/{id}/otc`
pub async fn create_otc(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let otc = state.consents.create_otc(&tenant, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "code": otc.code,
            "consentId": otc.consent_id,
            "expiresAt": otc.expires_at,
        })),
    ))
}

/// `POST /api/v1/consents/auth/token` — public; the one-time code is the
/// authorization.
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExchangeTokenRequest>,
) -> ApiResult<Response> {
    let consent = state.consents.exchange_token(body).await?;
    Ok(with_etag(StatusCode::OK, &consent))
}

/// `POST /api/v1/consents/{id}/sie-upload` (multipart)
pub async fn sie_upload(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError(GatewayError::validation(format!("malformed multipart body: {e}")))
    })? {
        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await.map_err(|e| {
            AppError(GatewayError::validation(format!("failed reading upload: {e}")))
        })?;
        files.push((file_name, bytes.to_vec()));
    }
    let uploads = state.consents.sie_upload(&tenant, id, files).await?;
    Ok((StatusCode::CREATED, Json(json!({ "uploads": uploads }))))
}

/// `GET /api/v1/consents/{id}/sie`
pub async fn list_sie(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let uploads = state.consents.get_sie_uploads(&tenant, id).await?;
    Ok(Json(json!({ "data": uploads })))
}

/// `GET /api/v1/consents/{id}/sie/{upload_id}` — the full parsed payload
/// with KPIs.
pub async fn get_sie(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path((id, upload_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<lgw_store::SieRecord>> {
    let record = state.consents.get_sie_data(&tenant, id, upload_id).await?;
    Ok(Json(record))
}

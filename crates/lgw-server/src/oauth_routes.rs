// SPDX-License-Identifier: MIT OR Apache-2.0
//! OAuth routes, one set per vendor.
//!
//! A vendor without configured credentials answers 501 on every route
//! here; a vendor that simply has no authorize URL (client-credentials and
//! static-token vendors) answers 400 on `/url` only.

use crate::AppState;
use crate::auth::AuthTenant;
use crate::error::{ApiResult, AppError};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use lgw_config::VendorCredentials;
use lgw_consent::ExchangeTokenRequest;
use lgw_core::{Consent, Provider};
use lgw_error::{ErrorCode, GatewayError};
use lgw_oauth::TokenBundle;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn parse_provider(segment: &str) -> Result<Provider, AppError> {
    Provider::parse(segment).ok_or_else(|| {
        AppError(GatewayError::validation(format!(
            "unknown provider '{segment}'"
        )))
    })
}

fn vendor_credentials<'a>(
    state: &'a AppState,
    provider: Provider,
) -> Result<&'a VendorCredentials, AppError> {
    state.config.vendor(provider).ok_or_else(|| {
        AppError(GatewayError::new(
            ErrorCode::VendorNotConfigured,
            format!("vendor '{provider}' is not configured in this deployment"),
        ))
    })
}

#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    state: Option<String>,
    scopes: Option<String>,
}

/// `GET /api/v1/auth/{provider}/url`
pub async fn auth_url(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Path(provider): Path<String>,
    Query(query): Query<AuthUrlQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let provider = parse_provider(&provider)?;
    let credentials = vendor_credentials(&state, provider)?;
    let url = state.oauth.authorize_url(
        provider,
        credentials,
        query.state.as_deref().unwrap_or_default(),
        query.scopes.as_deref().unwrap_or("bookkeeping"),
    )?;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    code: String,
}

/// `POST /api/v1/auth/{provider}/exchange`
pub async fn exchange(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(_tenant)): Extension<AuthTenant>,
    Path(provider): Path<String>,
    Json(body): Json<ExchangeRequest>,
) -> ApiResult<Json<TokenBundle>> {
    let provider = parse_provider(&provider)?;
    let credentials = vendor_credentials(&state, provider)?;
    let bundle = state
        .oauth
        .exchange_code(provider, credentials, &body.code)
        .await?;
    Ok(Json(bundle))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    /// Authorization code from the vendor redirect.
    code: String,
    /// Consent being accepted.
    consent_id: Uuid,
    /// One-time code authorizing the acceptance (public route).
    otc: String,
    #[serde(default)]
    company_id: Option<String>,
}

/// `POST /api/v1/auth/{provider}/callback` — public: exchanges the vendor
/// code, stores tokens, and transitions the consent to `Accepted`.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(body): Json<CallbackRequest>,
) -> ApiResult<Json<Consent>> {
    let provider = parse_provider(&provider)?;
    let credentials = vendor_credentials(&state, provider)?;
    let bundle = state
        .oauth
        .exchange_code(provider, credentials, &body.code)
        .await?;
    let expires_in = bundle
        .token_expires_at
        .map(|at| (at - chrono::Utc::now()).num_seconds());
    let consent = state
        .consents
        .exchange_token(ExchangeTokenRequest {
            code: body.otc,
            consent_id: body.consent_id,
            provider,
            access_token: bundle.access_token,
            refresh_token: bundle.refresh_token,
            expires_in,
            scopes: bundle.scopes,
            company_id: body.company_id,
        })
        .await?;
    Ok(Json(consent))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRef {
    consent_id: Uuid,
}

/// `POST /api/v1/auth/{provider}/refresh`
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(provider): Path<String>,
    Json(body): Json<ConsentRef>,
) -> ApiResult<Json<serde_json::Value>> {
    let provider = parse_provider(&provider)?;
    vendor_credentials(&state, provider)?;
    state.consents.refresh_now(&tenant, body.consent_id).await?;
    Ok(Json(json!({ "refreshed": true })))
}

/// `POST /api/v1/auth/{provider}/revoke` — transitions the consent to
/// `Revoked` and best-effort revokes at the vendor.
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Extension(AuthTenant(tenant)): Extension<AuthTenant>,
    Path(provider): Path<String>,
    Json(body): Json<ConsentRef>,
) -> ApiResult<Json<Consent>> {
    parse_provider(&provider)?;
    let consent = state.consents.revoke(&tenant, body.consent_id).await?;
    Ok(Json(consent))
}

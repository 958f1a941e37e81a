// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ingress authentication: `Authorization: Bearer <api-key>` resolved to a
//! tenant by SHA-256 digest lookup.

use crate::AppState;
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use lgw_error::{ErrorCode, GatewayError};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// The tenant resolved from the API key, attached as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTenant(pub String);

/// Hex SHA-256 of raw key material.
pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the bearer token out of the `Authorization` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.is_empty())
}

/// Require a valid API key; attaches [`AuthTenant`] on success.
///
/// The tenant always derives from the key, never from a body field, which
/// is what makes cross-tenant access impossible by construction.
pub async fn api_key_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(raw) = extract_bearer(req.headers()) else {
        return Err(GatewayError::new(ErrorCode::ApiKeyMissing, "missing API key").into());
    };

    let tenant = resolve_tenant(&state, raw).await?;
    req.extensions_mut().insert(AuthTenant(tenant));
    Ok(next.run(req).await)
}

async fn resolve_tenant(state: &AppState, raw: &str) -> Result<String, AppError> {
    let digest = hash_api_key(raw);
    if let Some(key) = state.store.get_api_key(&digest).await? {
        if key.is_valid(Utc::now()) {
            return Ok(key.tenant_id);
        }
        return Err(
            GatewayError::new(ErrorCode::ApiKeyInvalid, "API key expired or revoked").into(),
        );
    }
    // Legacy single-key fallback, kept for one release.
    if let (Some(legacy), Some(tenant)) = (
        state.config.legacy_api_key.as_deref(),
        state.config.legacy_tenant_id.as_deref(),
    ) {
        if legacy == raw {
            return Ok(tenant.to_owned());
        }
    }
    Err(GatewayError::new(ErrorCode::ApiKeyInvalid, "unknown API key").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn digest_is_hex_sha256() {
        let digest = hash_api_key("test-key");
        assert_eq!(digest.len(), 64);
        // Stable digest of the literal "test-key".
        assert_eq!(
            digest,
            "62af8704764faf8ea82fc61ce9c4c3908b6cb97d463a634e9e587d7c885db0ef"
        );
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer(&headers), Some("abc"));
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);
    }
}

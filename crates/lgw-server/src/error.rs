// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP error wrapper: every [`GatewayError`] renders as the canonical
//! envelope with its mapped status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lgw_error::{ErrorEnvelope, GatewayError};
use lgw_store::StoreError;

/// Handler-level error: a [`GatewayError`] plus its HTTP rendering.
#[derive(Debug)]
pub struct AppError(pub GatewayError);

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope: ErrorEnvelope = (&self.0).into();
        (status, Json(envelope)).into_response()
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use lgw_error::ErrorCode;

    #[test]
    fn status_follows_the_taxonomy() {
        let resp = AppError(GatewayError::new(ErrorCode::EtagMismatch, "stale")).into_response();
        assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

        let resp = AppError(GatewayError::not_found("gone")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp =
            AppError(GatewayError::new(ErrorCode::VendorNotConfigured, "off")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP surface of the ledger gateway.
//!
//! Route tables over the consent service, the resource gateway, and the
//! sync engine.  Cross-cutting concerns — API-key auth, request ids,
//! structured request logging, CORS, the overall request timeout — live in
//! the middleware stack; the canonical error envelope comes from
//! [`error::AppError`].

#![deny(unsafe_code)]

pub mod auth;
pub mod connection_routes;
pub mod consent_routes;
pub mod data_routes;
pub mod error;
pub mod middleware;
pub mod oauth_routes;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use lgw_config::GatewayConfig;
use lgw_consent::ConsentService;
use lgw_gateway::Gateway;
use lgw_oauth::OAuthDriver;
use lgw_store::DatabaseAdapter;
use lgw_sync::SyncEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state.
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<GatewayConfig>,
    /// Database adapter.
    pub store: Arc<dyn DatabaseAdapter>,
    /// Consent service.
    pub consents: Arc<ConsentService>,
    /// Resource gateway.
    pub gateway: Arc<Gateway>,
    /// Sync engine.
    pub sync: Arc<SyncEngine>,
    /// OAuth driver.
    pub oauth: Arc<OAuthDriver>,
    /// Process start, for the health endpoint.
    pub started_at: Instant,
}

/// Build the full router.
///
/// The acceptance flow (`/consents/auth/token`, the OAuth callback) and
/// the health endpoint are public; everything else requires an API key.
pub fn build_app(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(consent_routes::health))
        .route(
            "/api/v1/consents/auth/token",
            post(consent_routes::exchange_token),
        )
        .route(
            "/api/v1/auth/{provider}/callback",
            post(oauth_routes::callback),
        );

    let protected = Router::new()
        .route(
            "/api/v1/consents",
            post(consent_routes::create).get(consent_routes::list),
        )
        .route(
            "/api/v1/consents/{id}",
            get(consent_routes::get_one)
                .patch(consent_routes::patch_one)
                .delete(consent_routes::delete_one),
        )
        .route("/api/v1/consents/{id}/otc", post(consent_routes::create_otc))
        .route(
            "/api/v1/consents/{id}/sie-upload",
            post(consent_routes::sie_upload),
        )
        .route("/api/v1/consents/{id}/sie", get(consent_routes::list_sie))
        .route(
            "/api/v1/consents/{id}/sie/{upload_id}",
            get(consent_routes::get_sie),
        )
        .route(
            "/api/v1/consents/{id}/{resource_type}",
            get(data_routes::list_resource).post(data_routes::create_resource),
        )
        .route(
            "/api/v1/consents/{id}/{resource_type}/{resource_id}",
            get(data_routes::get_resource),
        )
        .route(
            "/api/v1/consents/{id}/{resource_type}/{resource_id}/{sub_type}",
            get(data_routes::list_sub_resource).post(data_routes::create_sub_resource),
        )
        .route(
            "/api/v1/connections",
            post(connection_routes::create).get(connection_routes::list),
        )
        .route(
            "/api/v1/connections/{id}",
            get(connection_routes::get_one).delete(connection_routes::delete_one),
        )
        .route(
            "/api/v1/connections/{id}/sync",
            post(connection_routes::start_sync).get(connection_routes::sync_history),
        )
        .route(
            "/api/v1/connections/{id}/sync/{job_id}",
            get(connection_routes::sync_progress),
        )
        .route(
            "/api/v1/connections/{id}/entities/{entity_type}",
            get(connection_routes::list_entities),
        )
        .route("/api/v1/auth/{provider}/url", get(oauth_routes::auth_url))
        .route(
            "/api/v1/auth/{provider}/exchange",
            post(oauth_routes::exchange),
        )
        .route("/api/v1/auth/{provider}/refresh", post(oauth_routes::refresh))
        .route("/api/v1/auth/{provider}/revoke", post(oauth_routes::revoke))
        .route_layer(from_fn_with_state(
            Arc::clone(&state),
            auth::api_key_middleware,
        ));

    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    public
        .merge(protected)
        .layer(from_fn(middleware::request_id_middleware))
        .layer(from_fn(middleware::request_logger))
        .layer(from_fn(middleware::timeout_middleware(timeout)))
        .layer(middleware::cors_layer())
        .with_state(state)
}

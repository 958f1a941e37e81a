// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use lgw_config::GatewayConfig;
use lgw_consent::ConsentService;
use lgw_core::ApiKey;
use lgw_gateway::Gateway;
use lgw_oauth::OAuthDriver;
use lgw_ratelimit::RateLimiterRegistry;
use lgw_retry::RetryPolicy;
use lgw_server::{AppState, auth::hash_api_key, build_app};
use lgw_store::{DatabaseAdapter, MemoryStore};
use lgw_sync::SyncEngine;
use lgw_vault::TokenVault;
use lgw_vendor::ReqwestTransport;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lgw-server", version, about = "Ledger gateway server")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Enable request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("lgw=debug,lgw_server=debug,tower_http=info")
    } else {
        EnvFilter::new("lgw=info,lgw_server=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(GatewayConfig::from_env().context("load configuration")?);
    for warning in config.warnings() {
        warn!(%warning, "configuration warning");
    }

    let store: Arc<dyn DatabaseAdapter> = Arc::new(MemoryStore::new());
    seed_api_key(store.as_ref()).await?;

    let vault = Arc::new(
        TokenVault::from_key_hex(config.encryption_key_hex.as_deref())
            .context("initialise token vault")?,
    );
    let transport = Arc::new(ReqwestTransport::new());
    let limits = Arc::new(RateLimiterRegistry::with_defaults());
    let retry = RetryPolicy::default();
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let oauth = Arc::new(OAuthDriver::new(
        Arc::clone(&transport) as _,
        retry,
        timeout,
    ));
    let gateway = Arc::new(Gateway::new(
        Arc::clone(&transport) as _,
        limits,
        retry,
        timeout,
    ));
    let consents = Arc::new(ConsentService::new(
        Arc::clone(&store),
        vault,
        Arc::clone(&oauth),
        Arc::clone(&config),
    ));
    let sync = Arc::new(SyncEngine::new(Arc::clone(&store), Arc::clone(&gateway)));

    spawn_token_refresh_sweep(Arc::clone(&consents));

    let state = Arc::new(AppState {
        config,
        store,
        consents,
        gateway,
        sync,
        oauth,
        started_at: Instant::now(),
    });
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "lgw-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")
}

/// Seed an API key from the environment for bootstrap deployments.
async fn seed_api_key(store: &dyn DatabaseAdapter) -> Result<()> {
    let Ok(raw) = std::env::var("LGW_API_KEY") else {
        return Ok(());
    };
    let tenant_id = std::env::var("LGW_TENANT").unwrap_or_else(|_| "default".to_owned());
    store
        .upsert_api_key(ApiKey {
            key_hash: hash_api_key(&raw),
            tenant_id: tenant_id.clone(),
            expires_at: None,
            revoked_at: None,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| anyhow::anyhow!("seed API key: {e}"))?;
    info!(tenant = %tenant_id, "seeded API key from environment");
    Ok(())
}

/// Refresh tokens expiring within 30 minutes, every 15 minutes.
fn spawn_token_refresh_sweep(consents: Arc<ConsentService>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(15 * 60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match consents
                .refresh_expiring_tokens(chrono::Duration::minutes(30))
                .await
            {
                Ok(0) => {}
                Ok(count) => info!(count, "token refresh sweep completed"),
                Err(err) => warn!(error = %err, "token refresh sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    // Exit code 0 on ctrl-c.
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

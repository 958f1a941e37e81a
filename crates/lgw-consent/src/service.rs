// SPDX-License-Identifier: MIT OR Apache-2.0
//! The consent service.

use crate::requests::{CreateConsentRequest, ExchangeTokenRequest, PatchConsentRequest};
use chrono::{DateTime, Duration, Utc};
use lgw_config::{DeploymentMode, GatewayConfig};
use lgw_core::{
    Consent, ConsentStatus, ConsentToken, OneTimeCode, Provider,
};
use lgw_error::{ErrorCode, GatewayError, Result};
use lgw_oauth::OAuthDriver;
use lgw_sie::{compute_kpis, decode_sie_bytes, parse_sie, validate_sie_balances};
use lgw_store::{ConsentFilter, DatabaseAdapter, SieRecord, SieUploadMeta};
use lgw_vault::TokenVault;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Days a `Created` consent may linger before the purge sweep removes it.
const PURGE_CREATED_AFTER_DAYS: i64 = 30;
/// Days a `Revoked`/`Inactive` consent is kept before removal.
const PURGE_TERMINAL_AFTER_DAYS: i64 = 180;
/// Days without mutation after which an `Accepted` consent goes inactive.
const INACTIVITY_AFTER_DAYS: i64 = 180;

/// The outcome of data-plane credential resolution (§ consent-scoped
/// middleware): the consent plus a plaintext token row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAccess {
    /// The accepted consent.
    pub consent: Consent,
    /// Decrypted credentials ready for the vendor client.
    pub token: ConsentToken,
}

/// Consent lifecycle operations over the store, vault, and OAuth driver.
pub struct ConsentService {
    store: Arc<dyn DatabaseAdapter>,
    vault: Arc<TokenVault>,
    oauth: Arc<OAuthDriver>,
    config: Arc<GatewayConfig>,
}

impl ConsentService {
    /// Wire up the service.
    pub fn new(
        store: Arc<dyn DatabaseAdapter>,
        vault: Arc<TokenVault>,
        oauth: Arc<OAuthDriver>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            store,
            vault,
            oauth,
            config,
        }
    }

    // -- CRUD --------------------------------------------------------------

    /// Create a consent in the `Created` state.
    pub async fn create(
        &self,
        tenant_id: &str,
        request: CreateConsentRequest,
    ) -> Result<Consent> {
        if request.name.trim().is_empty() {
            return Err(GatewayError::validation("name must not be empty"));
        }
        let mut consent = Consent::new(tenant_id, request.name, request.provider);
        consent.org_number = request.org_number;
        consent.company_name = request.company_name;
        consent.expires_at = request.expires_at;
        self.store.upsert_consent(consent.clone()).await?;
        info!(consent_id = %consent.id, provider = %consent.provider, "consent created");
        Ok(consent)
    }

    /// List a tenant's consents.
    pub async fn list(&self, tenant_id: &str, filter: ConsentFilter) -> Result<Vec<Consent>> {
        Ok(self.store.get_consents(tenant_id, filter).await?)
    }

    /// Fetch a consent, scoped to the tenant.
    ///
    /// A consent owned by another tenant answers *not-found*, never
    /// *forbidden*, so ids do not leak across tenants.
    pub async fn get(&self, tenant_id: &str, consent_id: Uuid) -> Result<Consent> {
        let consent = self.store.get_consent(consent_id).await?;
        match consent {
            Some(c) if c.tenant_id == tenant_id => Ok(c),
            _ => Err(GatewayError::not_found(format!(
                "consent {consent_id} not found"
            ))),
        }
    }

    /// Patch a consent under optimistic concurrency.
    ///
    /// When `if_match` is present it must equal the stored etag; on
    /// success the etag is regenerated.
    pub async fn patch(
        &self,
        tenant_id: &str,
        consent_id: Uuid,
        if_match: Option<&str>,
        patch: PatchConsentRequest,
    ) -> Result<Consent> {
        let mut consent = self.get(tenant_id, consent_id).await?;
        if let Some(expected) = if_match {
            if expected != consent.etag {
                return Err(GatewayError::new(
                    ErrorCode::EtagMismatch,
                    "If-Match does not match the current version",
                ));
            }
        }
        if let Some(status) = patch.status {
            if status != consent.status && !consent.status.can_transition_to(status) {
                return Err(GatewayError::validation(format!(
                    "cannot transition consent from {:?} to {:?}",
                    consent.status, status
                )));
            }
            consent.status = status;
        }
        if let Some(name) = patch.name {
            consent.name = name;
        }
        if let Some(org_number) = patch.org_number {
            consent.org_number = Some(org_number);
        }
        if let Some(company_name) = patch.company_name {
            consent.company_name = Some(company_name);
        }
        if let Some(expires_at) = patch.expires_at {
            consent.expires_at = Some(expires_at);
        }
        consent.touch();
        self.store.upsert_consent(consent.clone()).await?;
        Ok(consent)
    }

    /// Delete a consent; the adapter cascades to tokens and codes.
    pub async fn delete(&self, tenant_id: &str, consent_id: Uuid) -> Result<()> {
        // Scope check first so cross-tenant deletes read as missing.
        self.get(tenant_id, consent_id).await?;
        self.store.delete_consent(consent_id).await?;
        info!(consent_id = %consent_id, "consent deleted");
        Ok(())
    }

    // -- One-time codes -----------------------------------------------------

    /// Generate a one-time code for the acceptance handoff.
    pub async fn create_otc(&self, tenant_id: &str, consent_id: Uuid) -> Result<OneTimeCode> {
        self.get(tenant_id, consent_id).await?;
        let otc = OneTimeCode::generate(
            consent_id,
            Duration::minutes(self.config.otc_ttl_minutes),
        );
        self.store.create_one_time_code(otc.clone()).await?;
        Ok(otc)
    }

    /// Validate and consume a code (atomic single-use).
    pub async fn validate_otc(&self, code: &str) -> Result<Option<OneTimeCode>> {
        Ok(self.store.validate_one_time_code(code).await?)
    }

    // -- Token exchange ------------------------------------------------------

    /// Accept a consent: consume the code, store the tokens ciphered, and
    /// transition to `Accepted`.
    ///
    /// The one-time code is the authorization here; the acceptance flow
    /// carries no API key.
    pub async fn exchange_token(&self, request: ExchangeTokenRequest) -> Result<Consent> {
        let otc = self
            .validate_otc(&request.code)
            .await?
            .ok_or_else(|| {
                GatewayError::new(ErrorCode::OtcInvalid, "code is unknown, expired, or used")
            })?;
        if otc.consent_id != request.consent_id {
            return Err(GatewayError::validation(
                "code does not belong to the stated consent",
            ));
        }
        let mut consent = self
            .store
            .get_consent(request.consent_id)
            .await?
            .ok_or_else(|| GatewayError::not_found("consent not found"))?;
        if consent.provider != request.provider {
            return Err(GatewayError::validation(format!(
                "consent is bound to '{}', not '{}'",
                consent.provider, request.provider
            )));
        }
        if !consent.status.can_transition_to(ConsentStatus::Accepted)
            && consent.status != ConsentStatus::Accepted
        {
            return Err(GatewayError::validation(format!(
                "consent in state {:?} cannot be accepted",
                consent.status
            )));
        }

        let token = ConsentToken {
            consent_id: consent.id,
            provider: request.provider,
            access_token: request.access_token,
            refresh_token: request.refresh_token,
            token_expires_at: request
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            company_id: request.company_id,
            scopes: request.scopes,
            encrypted_at: None,
        };
        self.vault.store(self.store.as_ref(), token).await?;

        consent.status = ConsentStatus::Accepted;
        consent.touch();
        self.store.upsert_consent(consent.clone()).await?;
        info!(consent_id = %consent.id, provider = %consent.provider, "consent accepted");
        Ok(consent)
    }

    /// Revoke a consent and best-effort revoke the vendor token.
    pub async fn revoke(&self, tenant_id: &str, consent_id: Uuid) -> Result<Consent> {
        let mut consent = self.get(tenant_id, consent_id).await?;
        if consent.status != ConsentStatus::Revoked {
            if !consent.status.can_transition_to(ConsentStatus::Revoked) {
                return Err(GatewayError::validation(format!(
                    "consent in state {:?} cannot be revoked",
                    consent.status
                )));
            }
            if let (Some(vendor_creds), Ok(Some(token))) = (
                self.config.vendor(consent.provider),
                self.vault.load(self.store.as_ref(), consent_id).await,
            ) {
                if let Err(err) = self
                    .oauth
                    .revoke(consent.provider, vendor_creds, &token.access_token)
                    .await
                {
                    warn!(consent_id = %consent_id, error = %err, "vendor revoke failed");
                }
            }
            self.store.delete_consent_tokens(consent_id).await?;
            consent.status = ConsentStatus::Revoked;
            consent.touch();
            self.store.upsert_consent(consent.clone()).await?;
        }
        Ok(consent)
    }

    // -- SIE uploads ---------------------------------------------------------

    /// Ingest uploaded SIE files for a `sie-upload` consent: decode, parse,
    /// compute KPIs, store; auto-populate company fields from the first
    /// file and transition to `Accepted`.
    pub async fn sie_upload(
        &self,
        tenant_id: &str,
        consent_id: Uuid,
        files: Vec<(Option<String>, Vec<u8>)>,
    ) -> Result<Vec<SieUploadMeta>> {
        let mut consent = self.get(tenant_id, consent_id).await?;
        if consent.provider != Provider::SieUpload {
            return Err(GatewayError::validation(
                "consent does not accept SIE uploads",
            ));
        }
        if files.is_empty() {
            return Err(GatewayError::validation("no files in upload"));
        }

        let mut uploads = Vec::with_capacity(files.len());
        for (file_name, bytes) in files {
            let text = decode_sie_bytes(&bytes).map_err(|e| {
                GatewayError::validation(format!("SIE decode failed: {e}"))
            })?;
            let doc = parse_sie(&text).map_err(|e| {
                GatewayError::validation(format!("SIE parse failed: {e}"))
            })?;
            let validation = validate_sie_balances(&doc);
            if !validation.is_ok() {
                return Err(GatewayError::validation(format!(
                    "SIE file lacks usable balances: {:?}",
                    validation.errors
                )));
            }
            let kpis = compute_kpis(&doc);

            if consent.company_name.is_none() {
                consent.company_name = Some(doc.metadata.company_name.clone());
            }
            if consent.org_number.is_none() {
                consent.org_number = doc.metadata.org_number.clone();
            }

            // Uploaded files hang off the consent id as their connection
            // scope.
            let record = SieRecord::new(consent_id, file_name, doc, kpis);
            uploads.push(record.meta());
            self.store.store_sie_data(record).await?;
        }

        if consent.status == ConsentStatus::Created {
            consent.status = ConsentStatus::Accepted;
        }
        consent.touch();
        self.store.upsert_consent(consent.clone()).await?;
        Ok(uploads)
    }

    /// Listing views of a consent's stored SIE files.
    pub async fn get_sie_uploads(
        &self,
        tenant_id: &str,
        consent_id: Uuid,
    ) -> Result<Vec<SieUploadMeta>> {
        self.get(tenant_id, consent_id).await?;
        Ok(self.store.get_sie_uploads(consent_id).await?)
    }

    /// One stored SIE file, full payload.
    pub async fn get_sie_data(
        &self,
        tenant_id: &str,
        consent_id: Uuid,
        upload_id: Uuid,
    ) -> Result<SieRecord> {
        self.get(tenant_id, consent_id).await?;
        self.store
            .get_sie_data(consent_id, upload_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("upload {upload_id} not found")))
    }

    // -- Data-plane resolution ----------------------------------------------

    /// Resolve `(consent, credentials)` for a data-plane request.
    ///
    /// Order: load (404) → require `Accepted` (403) → managed tokens with
    /// decrypt (500 on cipher error) → on-path refresh when expired →
    /// bearer fall-back only in self-hosted mode.
    pub async fn resolve_credentials(
        &self,
        tenant_id: &str,
        consent_id: Uuid,
        bearer_fallback: Option<&str>,
    ) -> Result<ResolvedAccess> {
        let consent = self.get(tenant_id, consent_id).await?;
        if consent.status != ConsentStatus::Accepted {
            return Err(GatewayError::new(
                ErrorCode::ConsentNotAccepted,
                format!("consent is in state {}", consent.status.as_u8()),
            ));
        }

        match self.vault.load(self.store.as_ref(), consent_id).await? {
            Some(token) => {
                let now = Utc::now();
                let token = if token.is_expired(now) {
                    self.refresh_and_store(&consent, token).await?
                } else {
                    token
                };
                Ok(ResolvedAccess { consent, token })
            }
            None => {
                // Managed tokens are the norm; a raw bearer is accepted only
                // when the operator runs the gateway for themselves.
                if self.config.mode == DeploymentMode::SelfHosted {
                    if let Some(bearer) = bearer_fallback {
                        return Ok(ResolvedAccess {
                            token: ConsentToken {
                                consent_id,
                                provider: consent.provider,
                                access_token: bearer.to_owned(),
                                refresh_token: None,
                                token_expires_at: None,
                                company_id: None,
                                scopes: None,
                                encrypted_at: None,
                            },
                            consent,
                        });
                    }
                }
                Err(GatewayError::new(
                    ErrorCode::TokenMissing,
                    "no credentials stored for this consent",
                ))
            }
        }
    }

    async fn refresh_and_store(
        &self,
        consent: &Consent,
        stored: ConsentToken,
    ) -> Result<ConsentToken> {
        let vendor_creds = self.config.vendor(consent.provider).ok_or_else(|| {
            GatewayError::new(
                ErrorCode::VendorNotConfigured,
                format!("vendor '{}' is not configured", consent.provider),
            )
        })?;
        let bundle = self
            .oauth
            .refresh_tokens(consent.provider, vendor_creds, &stored)
            .await
            .map_err(|err| {
                if err.code == ErrorCode::UpstreamStatus {
                    GatewayError::new(
                        ErrorCode::TokenRefreshFailed,
                        "token refresh failed; re-authorize the consent",
                    )
                    .with_context("status_code", err.upstream_status())
                } else {
                    err
                }
            })?;
        let refreshed = ConsentToken {
            consent_id: stored.consent_id,
            provider: stored.provider,
            access_token: bundle.access_token,
            refresh_token: bundle.refresh_token.or(stored.refresh_token),
            token_expires_at: bundle.token_expires_at,
            company_id: stored.company_id,
            scopes: bundle.scopes.or(stored.scopes),
            encrypted_at: None,
        };
        self.vault
            .store(self.store.as_ref(), refreshed.clone())
            .await?;
        info!(consent_id = %stored.consent_id, "tokens refreshed on request path");
        Ok(refreshed)
    }

    /// Refresh a consent's tokens immediately (the explicit refresh route).
    pub async fn refresh_now(&self, tenant_id: &str, consent_id: Uuid) -> Result<()> {
        let consent = self.get(tenant_id, consent_id).await?;
        let token = self
            .vault
            .load(self.store.as_ref(), consent_id)
            .await?
            .ok_or_else(|| {
                GatewayError::new(ErrorCode::TokenMissing, "no credentials stored")
            })?;
        self.refresh_and_store(&consent, token).await?;
        Ok(())
    }

    // -- Sweeps --------------------------------------------------------------

    /// Refresh every token expiring within `within`; returns how many
    /// refreshed.  Failures log and continue.
    pub async fn refresh_expiring_tokens(&self, within: Duration) -> Result<usize> {
        let cutoff = Utc::now() + within;
        let expiring = self.store.get_tokens_expiring_before(cutoff).await?;
        let mut refreshed = 0;
        for sealed in expiring {
            let Some(consent) = self.store.get_consent(sealed.consent_id).await? else {
                continue;
            };
            if consent.status != ConsentStatus::Accepted {
                continue;
            }
            let token = match self.vault.open(sealed) {
                Ok(token) => token,
                Err(err) => {
                    warn!(consent_id = %consent.id, error = %err, "sweep: cannot decrypt tokens");
                    continue;
                }
            };
            match self.refresh_and_store(&consent, token).await {
                Ok(_) => refreshed += 1,
                Err(err) => {
                    warn!(consent_id = %consent.id, error = %err, "sweep: refresh failed");
                }
            }
        }
        Ok(refreshed)
    }

    /// Move `Accepted` consents untouched for 180 days to `Inactive`.
    pub async fn mark_inactive_consents(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::days(INACTIVITY_AFTER_DAYS);
        let mut marked = 0;
        for mut consent in self
            .store
            .get_consents_by_status(ConsentStatus::Accepted)
            .await?
        {
            if consent.updated_at < cutoff {
                consent.status = ConsentStatus::Inactive;
                consent.touch();
                self.store.upsert_consent(consent).await?;
                marked += 1;
            }
        }
        Ok(marked)
    }

    /// Purge policy: `Created` older than 30 days, `Revoked`/`Inactive`
    /// older than 180 days.  Returns how many were deleted.
    pub async fn purge_stale_consents(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut purged = 0;
        let created_cutoff = now - Duration::days(PURGE_CREATED_AFTER_DAYS);
        for consent in self
            .store
            .get_consents_by_status(ConsentStatus::Created)
            .await?
        {
            if consent.created_at < created_cutoff {
                self.store.delete_consent(consent.id).await?;
                purged += 1;
            }
        }
        let terminal_cutoff = now - Duration::days(PURGE_TERMINAL_AFTER_DAYS);
        for status in [ConsentStatus::Revoked, ConsentStatus::Inactive] {
            for consent in self.store.get_consents_by_status(status).await? {
                if consent.updated_at < terminal_cutoff {
                    self.store.delete_consent(consent.id).await?;
                    purged += 1;
                }
            }
        }
        if purged > 0 {
            info!(purged, "stale consents purged");
        }
        Ok(purged)
    }
}

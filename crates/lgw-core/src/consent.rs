// SPDX-License-Identifier: MIT OR Apache-2.0
//! The consent model: the consent entity and its state machine, vendor
//! tokens, one-time codes, connections, and API keys.

use crate::provider::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ConsentStatus
// ---------------------------------------------------------------------------

/// Consent lifecycle state.
///
/// Serialises as the numeric wire value (`0..=3`); only [`Accepted`]
/// permits data-plane access.
///
/// [`Accepted`]: ConsentStatus::Accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ConsentStatus {
    /// Created, not yet accepted by the end-user organization.
    Created,
    /// Accepted; data-plane access is allowed.
    Accepted,
    /// Revoked by the organization or an operator.
    Revoked,
    /// Marked inactive after a long period without use.
    Inactive,
}

impl ConsentStatus {
    /// Numeric wire value.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Accepted => 1,
            Self::Revoked => 2,
            Self::Inactive => 3,
        }
    }

    /// Returns the set of statuses that are valid successors of `self`.
    pub fn valid_transitions(&self) -> &'static [ConsentStatus] {
        match self {
            Self::Created => &[Self::Accepted, Self::Revoked],
            Self::Accepted => &[Self::Revoked, Self::Inactive],
            Self::Inactive => &[Self::Revoked],
            Self::Revoked => &[],
        }
    }

    /// Returns `true` if transitioning from `self` to `next` is valid.
    pub fn can_transition_to(&self, next: ConsentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl From<ConsentStatus> for u8 {
    fn from(s: ConsentStatus) -> u8 {
        s.as_u8()
    }
}

impl TryFrom<u8> for ConsentStatus {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Created),
            1 => Ok(Self::Accepted),
            2 => Ok(Self::Revoked),
            3 => Ok(Self::Inactive),
            other => Err(format!("unknown consent status {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

/// A tenant-scoped grant for the gateway to access one vendor account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    /// Consent identifier.
    pub id: Uuid,
    /// Owning tenant; derived from the API key, never from a body field.
    pub tenant_id: String,
    /// Display name chosen by the caller.
    pub name: String,
    /// Backing vendor.
    pub provider: Provider,
    /// Swedish organization number of the end-user organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_number: Option<String>,
    /// Company display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Lifecycle state.
    pub status: ConsentStatus,
    /// Opaque version token; regenerated on every mutation.
    pub etag: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Optional expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Consent {
    /// Create a new consent in the `Created` state with a fresh etag.
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>, provider: Provider) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            provider,
            org_number: None,
            company_name: None,
            status: ConsentStatus::Created,
            etag: fresh_etag(),
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    /// Regenerate the etag and bump `updated_at`.  Call after every mutation.
    pub fn touch(&mut self) {
        self.etag = fresh_etag();
        self.updated_at = Utc::now();
    }
}

/// Generate a fresh opaque etag.
pub fn fresh_etag() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// ConsentToken
// ---------------------------------------------------------------------------

/// Vendor credentials held for one consent (at most one row per consent).
///
/// The token fields hold ciphertext when an encryption key is configured;
/// the vault is the only component that moves between the two forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentToken {
    /// Owning consent.
    pub consent_id: Uuid,
    /// Vendor the tokens are valid for.
    pub provider: Provider,
    /// Access token (or static API token).
    pub access_token: String,
    /// Refresh token, for authorization-code vendors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access-token expiry; `None` for static tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Vendor-scoped company identifier (Bokio company id, Björn Lundén
    /// user key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    /// Granted scopes as reported by the vendor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// When the secrets were last ciphered; `None` in development plaintext
    /// mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_at: Option<DateTime<Utc>>,
}

impl ConsentToken {
    /// Whether the access token has expired as of `now`.
    ///
    /// Static tokens (no expiry) never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|at| at < now)
    }
}

// ---------------------------------------------------------------------------
// OneTimeCode
// ---------------------------------------------------------------------------

/// Short-lived handoff token bound to exactly one consent.
///
/// Single-use: the first successful validation sets `used_at`; any later
/// validation of the same code fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeCode {
    /// 16 hex characters.
    pub code: String,
    /// The consent this code hands off.
    pub consent_id: Uuid,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Set atomically on first successful validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl OneTimeCode {
    /// Length of the code in hex characters.
    pub const CODE_LEN: usize = 16;

    /// Generate a fresh code valid for `valid_for` from now.
    pub fn generate(consent_id: Uuid, valid_for: chrono::Duration) -> Self {
        let now = Utc::now();
        let mut code = Uuid::new_v4().simple().to_string();
        code.truncate(Self::CODE_LEN);
        Self {
            code,
            consent_id,
            expires_at: now + valid_for,
            used_at: None,
            created_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A materialized, synced integration.
///
/// Distinct from a [`Consent`]: a consent owns authorization, a connection
/// owns synced data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Connection identifier.
    pub connection_id: Uuid,
    /// Backing vendor.
    pub provider: Provider,
    /// Display name.
    pub display_name: String,
    /// Swedish organization number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_number: Option<String>,
    /// When the last sync job finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Value,
}

// ---------------------------------------------------------------------------
// ApiKey
// ---------------------------------------------------------------------------

/// A hashed ingress credential bound to exactly one tenant.
///
/// Only the SHA-256 hex digest is stored; resolution is a single map lookup
/// by digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    /// SHA-256 hex digest of the key material.
    pub key_hash: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Optional expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when the key is revoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Whether the key is usable as of `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|at| at > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_serialises_numerically() {
        assert_eq!(serde_json::to_string(&ConsentStatus::Created).unwrap(), "0");
        assert_eq!(serde_json::to_string(&ConsentStatus::Accepted).unwrap(), "1");
        assert_eq!(serde_json::to_string(&ConsentStatus::Revoked).unwrap(), "2");
        assert_eq!(serde_json::to_string(&ConsentStatus::Inactive).unwrap(), "3");
        let s: ConsentStatus = serde_json::from_str("1").unwrap();
        assert_eq!(s, ConsentStatus::Accepted);
        assert!(serde_json::from_str::<ConsentStatus>("7").is_err());
    }

    #[test]
    fn lifecycle_transitions() {
        use ConsentStatus::*;
        assert!(Created.can_transition_to(Accepted));
        assert!(Created.can_transition_to(Revoked));
        assert!(!Created.can_transition_to(Inactive));
        assert!(Accepted.can_transition_to(Revoked));
        assert!(Accepted.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Revoked));
        assert!(Revoked.valid_transitions().is_empty());
        assert!(!Revoked.can_transition_to(Accepted));
    }

    #[test]
    fn touch_regenerates_etag() {
        let mut consent = Consent::new("tenant-a", "Bookkeeping", Provider::Fortnox);
        let before = consent.etag.clone();
        consent.touch();
        assert_ne!(consent.etag, before);
        assert!(consent.updated_at >= consent.created_at);
    }

    #[test]
    fn new_consent_starts_created() {
        let consent = Consent::new("tenant-a", "X", Provider::Visma);
        assert_eq!(consent.status, ConsentStatus::Created);
        assert_eq!(consent.etag.len(), 32);
        let json = serde_json::to_value(&consent).unwrap();
        assert_eq!(json["status"], 0);
        assert_eq!(json["tenantId"], "tenant-a");
    }

    #[test]
    fn otc_is_sixteen_hex_chars() {
        let otc = OneTimeCode::generate(Uuid::new_v4(), Duration::minutes(60));
        assert_eq!(otc.code.len(), OneTimeCode::CODE_LEN);
        assert!(otc.code.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(otc.used_at.is_none());
        assert!(otc.expires_at > otc.created_at);
    }

    #[test]
    fn token_expiry() {
        let now = Utc::now();
        let mut token = ConsentToken {
            consent_id: Uuid::new_v4(),
            provider: Provider::Fortnox,
            access_token: "T".into(),
            refresh_token: Some("R".into()),
            token_expires_at: Some(now - Duration::minutes(1)),
            company_id: None,
            scopes: None,
            encrypted_at: None,
        };
        assert!(token.is_expired(now));
        token.token_expires_at = Some(now + Duration::minutes(1));
        assert!(!token.is_expired(now));
        // Static tokens never expire.
        token.token_expires_at = None;
        assert!(!token.is_expired(now));
    }

    #[test]
    fn api_key_validity() {
        let now = Utc::now();
        let mut key = ApiKey {
            key_hash: "ab".repeat(32),
            tenant_id: "tenant-a".into(),
            expires_at: None,
            revoked_at: None,
            created_at: now,
        };
        assert!(key.is_valid(now));
        key.expires_at = Some(now - Duration::seconds(1));
        assert!(!key.is_valid(now));
        key.expires_at = Some(now + Duration::hours(1));
        key.revoked_at = Some(now);
        assert!(!key.is_valid(now));
    }
}

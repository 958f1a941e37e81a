// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request bodies for the consent surface.

use chrono::{DateTime, Utc};
use lgw_core::{ConsentStatus, Provider};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/v1/consents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsentRequest {
    /// Display name.
    pub name: String,
    /// Backing vendor.
    pub provider: Provider,
    /// Organization number, when known up front.
    #[serde(default)]
    pub org_number: Option<String>,
    /// Company name, when known up front.
    #[serde(default)]
    pub company_name: Option<String>,
    /// Optional expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of `PATCH /api/v1/consents/:id`.  Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchConsentRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New organization number.
    #[serde(default)]
    pub org_number: Option<String>,
    /// New company name.
    #[serde(default)]
    pub company_name: Option<String>,
    /// Status transition; validated against the state machine.
    #[serde(default)]
    pub status: Option<ConsentStatus>,
    /// New expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/v1/consents/auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTokenRequest {
    /// The one-time code handed to the acceptance flow.
    pub code: String,
    /// The consent being accepted; must match the code's binding.
    pub consent_id: Uuid,
    /// Vendor of the tokens; must match the consent.
    pub provider: Provider,
    /// Vendor access token.
    pub access_token: String,
    /// Vendor refresh token, for authorization-code vendors.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    /// Vendor-scoped company identifier (Bokio company id, Björn Lundén
    /// user key).
    #[serde(default)]
    pub company_id: Option<String>,
}

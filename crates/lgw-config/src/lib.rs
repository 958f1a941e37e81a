// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and validation for the ledger gateway.
//!
//! Settings come from the environment, read once at startup into
//! [`GatewayConfig`].  Hard requirements fail startup with a
//! [`ConfigError`]; soft problems become advisory [`ConfigWarning`]s.  A
//! vendor whose credentials are absent is *disabled*, not fatal — its
//! routes answer 501.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use lgw_core::Provider;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing required setting {name}")]
    Missing {
        /// Environment variable name.
        name: &'static str,
    },
    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve
/// attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No encryption key: tokens persist in the clear (development only).
    PlaintextVault,
    /// A vendor has no credentials and is disabled.
    VendorDisabled {
        /// The disabled vendor.
        provider: Provider,
    },
    /// The request timeout is unusually large.
    LargeTimeout {
        /// Timeout value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::PlaintextVault => {
                write!(f, "no token encryption key; secrets persist in the clear")
            }
            ConfigWarning::VendorDisabled { provider } => {
                write!(f, "vendor '{provider}' has no credentials and is disabled")
            }
            ConfigWarning::LargeTimeout { secs } => {
                write!(f, "request timeout is unusually large ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Hosted or self-hosted deployment.
///
/// Self-hosted mode permits the `Authorization: Bearer` fall-back on the
/// data plane when no managed tokens exist; hosted mode does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Multi-tenant hosted deployment.
    Hosted,
    /// Single-operator self-hosted deployment.
    SelfHosted,
}

/// OAuth / API credentials for one vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorCredentials {
    /// OAuth client id (or API key id).
    pub client_id: String,
    /// OAuth client secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Redirect URI for authorization-code vendors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Database connection string.
    pub database_url: String,
    /// Token encryption key as 64 hex chars; absent only in development.
    pub encryption_key_hex: Option<String>,
    /// Deployment mode.
    pub mode: DeploymentMode,
    /// Overall per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// One-time-code validity in minutes.
    pub otc_ttl_minutes: i64,
    /// Legacy single API key accepted for one release; pairs with
    /// `legacy_tenant_id`.
    pub legacy_api_key: Option<String>,
    /// Tenant the legacy key resolves to.
    pub legacy_tenant_id: Option<String>,
    /// Per-vendor credentials; absent vendors are disabled.
    pub fortnox: Option<VendorCredentials>,
    /// Visma eEkonomi credentials.
    pub visma: Option<VendorCredentials>,
    /// Briox credentials.
    pub briox: Option<VendorCredentials>,
    /// Bokio credentials.
    pub bokio: Option<VendorCredentials>,
    /// Björn Lundén credentials.
    pub bjornlunden: Option<VendorCredentials>,
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through a lookup function (test seam).
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let database_url = lookup("LGW_DATABASE_URL").ok_or(ConfigError::Missing {
            name: "LGW_DATABASE_URL",
        })?;

        let mode = match lookup("LGW_MODE").as_deref() {
            Some("self_hosted") | Some("self-hosted") => DeploymentMode::SelfHosted,
            _ => DeploymentMode::Hosted,
        };

        let vendor = |prefix: &str| {
            lookup(&format!("{prefix}_CLIENT_ID")).map(|client_id| VendorCredentials {
                client_id,
                client_secret: lookup(&format!("{prefix}_CLIENT_SECRET")),
                redirect_uri: lookup(&format!("{prefix}_REDIRECT_URI")),
            })
        };

        let config = Self {
            database_url,
            encryption_key_hex: lookup("LGW_TOKEN_ENCRYPTION_KEY"),
            mode,
            request_timeout_secs: lookup("LGW_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            otc_ttl_minutes: lookup("LGW_OTC_TTL_MINUTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            legacy_api_key: lookup("LGW_LEGACY_API_KEY"),
            legacy_tenant_id: lookup("LGW_LEGACY_TENANT"),
            fortnox: vendor("FORTNOX"),
            visma: vendor("VISMA"),
            briox: vendor("BRIOX"),
            bokio: vendor("BOKIO"),
            bjornlunden: vendor("BJORNLUNDEN"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation of loaded values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();
        if self.database_url.trim().is_empty() {
            reasons.push("LGW_DATABASE_URL is empty".to_string());
        }
        if let Some(key) = &self.encryption_key_hex {
            if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                reasons.push("LGW_TOKEN_ENCRYPTION_KEY must be 64 hex characters".to_string());
            }
        }
        if self.request_timeout_secs == 0 {
            reasons.push("LGW_REQUEST_TIMEOUT_SECS must be positive".to_string());
        }
        if self.otc_ttl_minutes <= 0 {
            reasons.push("LGW_OTC_TTL_MINUTES must be positive".to_string());
        }
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }

    /// Advisory warnings for the operator log.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut out = Vec::new();
        if self.encryption_key_hex.is_none() {
            out.push(ConfigWarning::PlaintextVault);
        }
        for provider in [
            Provider::Fortnox,
            Provider::Visma,
            Provider::Briox,
            Provider::Bokio,
            Provider::Bjornlunden,
        ] {
            if self.vendor(provider).is_none() {
                out.push(ConfigWarning::VendorDisabled { provider });
            }
        }
        if self.request_timeout_secs > 300 {
            out.push(ConfigWarning::LargeTimeout {
                secs: self.request_timeout_secs,
            });
        }
        out
    }

    /// Credentials for `provider`; `None` means the vendor is disabled.
    ///
    /// The SIE-upload pseudo-vendor needs no credentials and always reports
    /// `None`.
    pub fn vendor(&self, provider: Provider) -> Option<&VendorCredentials> {
        match provider {
            Provider::Fortnox => self.fortnox.as_ref(),
            Provider::Visma => self.visma.as_ref(),
            Provider::Briox => self.briox.as_ref(),
            Provider::Bokio => self.bokio.as_ref(),
            Provider::Bjornlunden => self.bjornlunden.as_ref(),
            Provider::SieUpload => None,
        }
    }

    /// Whether `provider`'s routes are enabled in this deployment.
    pub fn vendor_enabled(&self, provider: Provider) -> bool {
        provider == Provider::SieUpload || self.vendor(provider).is_some()
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the ledger gateway.
//!
//! Every gateway error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context.  Each code maps onto exactly one HTTP status
//! so the edge can translate failures without inspecting messages.  Use the
//! builder returned by [`GatewayError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed request bodies, queries, or parameters.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// Optimistic-concurrency conflicts (stale `If-Match`).
    Conflict,
    /// Missing or invalid credentials (API key, OAuth token, OTC).
    Auth,
    /// Authenticated but not allowed (consent not accepted).
    Forbidden,
    /// A backing vendor rejected or failed the upstream call.
    Upstream,
    /// The operation is not available for the vendor or deployment.
    Unsupported,
    /// At-rest cryptography failures (operator error, never client error).
    Crypto,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Auth => "auth",
            Self::Forbidden => "forbidden",
            Self::Upstream => "upstream",
            Self::Unsupported => "unsupported",
            Self::Crypto => "crypto",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Validation --
    /// Request body, query, or path parameter failed validation.
    ValidationFailed,
    /// The resource type is not mapped for the vendor.
    ResourceNotSupported,
    /// The vendor does not permit the requested write.
    WriteNotSupported,

    // -- Not found --
    /// The referenced entity does not exist (or belongs to another tenant).
    NotFound,

    // -- Conflict --
    /// `If-Match` did not equal the stored etag.
    EtagMismatch,

    // -- Auth --
    /// No API key was presented.
    ApiKeyMissing,
    /// The presented API key is unknown, expired, or revoked.
    ApiKeyInvalid,
    /// No usable vendor token exists for the consent.
    TokenMissing,
    /// The vendor token is expired and could not be refreshed.
    TokenRefreshFailed,
    /// The one-time code is unknown, expired, or already used.
    OtcInvalid,

    // -- Forbidden --
    /// The consent exists but is not in the Accepted state.
    ConsentNotAccepted,

    // -- Upstream --
    /// The vendor answered with a non-2xx status.
    UpstreamStatus,
    /// Retries against the vendor were exhausted.
    UpstreamExhausted,
    /// The vendor payload could not be decoded.
    UpstreamDecode,

    // -- Unsupported --
    /// The vendor's OAuth client is not configured in this deployment.
    VendorNotConfigured,

    // -- Crypto --
    /// Stored ciphertext failed to decrypt (key mismatch or corruption).
    DecryptFailed,
    /// The configured encryption key is malformed.
    KeyInvalid,

    // -- Internal --
    /// Database adapter failure.
    StoreFailed,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationFailed | Self::ResourceNotSupported | Self::WriteNotSupported => {
                ErrorCategory::Validation
            }

            Self::NotFound => ErrorCategory::NotFound,

            Self::EtagMismatch => ErrorCategory::Conflict,

            Self::ApiKeyMissing
            | Self::ApiKeyInvalid
            | Self::TokenMissing
            | Self::TokenRefreshFailed
            | Self::OtcInvalid => ErrorCategory::Auth,

            Self::ConsentNotAccepted => ErrorCategory::Forbidden,

            Self::UpstreamStatus | Self::UpstreamExhausted | Self::UpstreamDecode => {
                ErrorCategory::Upstream
            }

            Self::VendorNotConfigured => ErrorCategory::Unsupported,

            Self::DecryptFailed | Self::KeyInvalid => ErrorCategory::Crypto,

            Self::StoreFailed | Self::Internal => ErrorCategory::Internal,
        }
    }

    /// The HTTP status this code maps onto at the edge.
    ///
    /// Decryption failures map to 500 rather than 401: they indicate an
    /// operator-side key problem, not a client credential problem.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed | Self::ResourceNotSupported | Self::WriteNotSupported => 400,
            Self::NotFound => 404,
            Self::EtagMismatch => 412,
            Self::ApiKeyMissing
            | Self::ApiKeyInvalid
            | Self::TokenMissing
            | Self::TokenRefreshFailed
            | Self::OtcInvalid => 401,
            Self::ConsentNotAccepted => 403,
            Self::UpstreamStatus | Self::UpstreamExhausted | Self::UpstreamDecode => 502,
            Self::VendorNotConfigured => 501,
            Self::DecryptFailed | Self::KeyInvalid => 500,
            Self::StoreFailed | Self::Internal => 500,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"ETAG_MISMATCH"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::ResourceNotSupported => "RESOURCE_NOT_SUPPORTED",
            Self::WriteNotSupported => "WRITE_NOT_SUPPORTED",
            Self::NotFound => "NOT_FOUND",
            Self::EtagMismatch => "ETAG_MISMATCH",
            Self::ApiKeyMissing => "API_KEY_MISSING",
            Self::ApiKeyInvalid => "API_KEY_INVALID",
            Self::TokenMissing => "TOKEN_MISSING",
            Self::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            Self::OtcInvalid => "OTC_INVALID",
            Self::ConsentNotAccepted => "CONSENT_NOT_ACCEPTED",
            Self::UpstreamStatus => "UPSTREAM_STATUS",
            Self::UpstreamExhausted => "UPSTREAM_EXHAUSTED",
            Self::UpstreamDecode => "UPSTREAM_DECODE",
            Self::VendorNotConfigured => "VENDOR_NOT_CONFIGURED",
            Self::DecryptFailed => "DECRYPT_FAILED",
            Self::KeyInvalid => "KEY_INVALID",
            Self::StoreFailed => "STORE_FAILED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Unified gateway error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use lgw_error::{ErrorCode, GatewayError};
///
/// let err = GatewayError::new(ErrorCode::UpstreamStatus, "fortnox answered 429")
///     .with_context("status_code", 429)
///     .with_context("vendor", "fortnox");
/// assert_eq!(err.http_status(), 502);
/// ```
pub struct GatewayError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GatewayError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for a [`ErrorCode::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for a [`ErrorCode::ValidationFailed`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Shorthand for a [`ErrorCode::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Upstream vendor failure carrying the status code and a truncated body.
    ///
    /// The body is capped at 2 KiB so error envelopes stay small even when a
    /// vendor returns an HTML error page.
    pub fn upstream(status_code: u16, body: impl AsRef<str>) -> Self {
        let body = body.as_ref();
        let truncated: String = body.chars().take(2048).collect();
        Self::new(
            ErrorCode::UpstreamStatus,
            format!("upstream responded with status {status_code}"),
        )
        .with_context("status_code", status_code)
        .with_context("body", truncated)
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.http_status()`.
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// The vendor status code recorded in the context, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        self.context
            .get("status_code")
            .and_then(|v| v.as_u64())
            .and_then(|v| u16::try_from(v).ok())
    }
}

impl fmt::Debug for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GatewayError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience alias used across the gateway crates.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`GatewayError`] (without the opaque source).
///
/// This is the wire shape of the canonical error envelope: `error` holds the
/// stable code, `message` the human-readable text, `details` the context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    /// Stable error code.
    pub error: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl From<&GatewayError> for ErrorEnvelope {
    fn from(err: &GatewayError) -> Self {
        Self {
            error: err.code,
            message: err.message.clone(),
            details: err.context.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

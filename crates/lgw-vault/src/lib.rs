// SPDX-License-Identifier: MIT OR Apache-2.0
//! Encrypted at-rest storage of vendor credentials.
//!
//! Secrets are ciphered with AES-256-GCM under a fresh 96-bit nonce per
//! call and stored as `base64(iv ‖ tag ‖ ciphertext)`.  Decryption fails
//! closed: a bad key or tampered ciphertext is a hard error that surfaces
//! as a 500, never a silent fall-back to plaintext.  Running without an
//! encryption key is permitted for development only; tokens then persist
//! in the clear and `encryptedAt` stays unset.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use lgw_core::ConsentToken;
use lgw_error::{ErrorCode, GatewayError};
use lgw_store::DatabaseAdapter;
use uuid::Uuid;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Vault failures.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The configured key is not 64 hex characters / 32 bytes.
    #[error("encryption key must be 64 hex characters")]
    KeyInvalid,
    /// Encryption failed (should not happen with a valid key).
    #[error("encryption failed")]
    EncryptFailed,
    /// Ciphertext failed integrity verification or is malformed.
    #[error("decryption failed: {reason}")]
    DecryptFailed {
        /// What went wrong, without leaking key material.
        reason: String,
    },
}

impl From<VaultError> for GatewayError {
    fn from(err: VaultError) -> Self {
        let code = match err {
            VaultError::KeyInvalid => ErrorCode::KeyInvalid,
            VaultError::EncryptFailed | VaultError::DecryptFailed { .. } => {
                ErrorCode::DecryptFailed
            }
        };
        GatewayError::new(code, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// TokenCipher
// ---------------------------------------------------------------------------

/// AES-256-GCM cipher over the configured 32-byte key.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build from a 64-hex-character key string.
    pub fn from_hex(key_hex: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(key_hex).map_err(|_| VaultError::KeyInvalid)?;
        if bytes.len() != 32 {
            return Err(VaultError::KeyInvalid);
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes).map_err(|_| VaultError::KeyInvalid)?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` to `base64(iv ‖ tag ‖ ciphertext)` under a fresh
    /// nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ct_and_tag = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::EncryptFailed)?;
        // The AEAD appends the tag; the storage format leads with it.
        let split = ct_and_tag.len() - TAG_LEN;
        let mut out = Vec::with_capacity(NONCE_LEN + ct_and_tag.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct_and_tag[split..]);
        out.extend_from_slice(&ct_and_tag[..split]);
        Ok(BASE64.encode(out))
    }

    /// Decrypt `base64(iv ‖ tag ‖ ciphertext)` back to plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String, VaultError> {
        let bytes = BASE64.decode(encoded).map_err(|_| VaultError::DecryptFailed {
            reason: "invalid base64".into(),
        })?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::DecryptFailed {
                reason: "ciphertext too short".into(),
            });
        }
        let nonce = Nonce::from_slice(&bytes[..NONCE_LEN]);
        let tag = &bytes[NONCE_LEN..NONCE_LEN + TAG_LEN];
        let ciphertext = &bytes[NONCE_LEN + TAG_LEN..];
        let mut ct_and_tag = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        ct_and_tag.extend_from_slice(ciphertext);
        ct_and_tag.extend_from_slice(tag);
        let plaintext = self
            .cipher
            .decrypt(nonce, ct_and_tag.as_ref())
            .map_err(|_| VaultError::DecryptFailed {
                reason: "integrity check failed".into(),
            })?;
        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptFailed {
            reason: "plaintext is not UTF-8".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// TokenVault
// ---------------------------------------------------------------------------

/// The vault: a cipher when a key is configured, plaintext in development.
pub enum TokenVault {
    /// Secrets are ciphered at rest.
    Ciphered(TokenCipher),
    /// Development mode: secrets persist in the clear.
    Plaintext,
}

impl TokenVault {
    /// Build from an optional 64-hex-character key.
    pub fn from_key_hex(key_hex: Option<&str>) -> Result<Self, VaultError> {
        match key_hex {
            Some(hex) => Ok(Self::Ciphered(TokenCipher::from_hex(hex)?)),
            None => Ok(Self::Plaintext),
        }
    }

    /// Whether secrets are ciphered at rest.
    pub fn is_ciphered(&self) -> bool {
        matches!(self, Self::Ciphered(_))
    }

    /// Cipher the secret fields of `token` for persistence.
    pub fn seal(&self, mut token: ConsentToken) -> Result<ConsentToken, VaultError> {
        match self {
            Self::Plaintext => Ok(token),
            Self::Ciphered(cipher) => {
                token.access_token = cipher.encrypt(&token.access_token)?;
                if let Some(refresh) = token.refresh_token.take() {
                    token.refresh_token = Some(cipher.encrypt(&refresh)?);
                }
                token.encrypted_at = Some(Utc::now());
                Ok(token)
            }
        }
    }

    /// Decipher the secret fields of a stored `token`.
    pub fn open(&self, mut token: ConsentToken) -> Result<ConsentToken, VaultError> {
        match self {
            Self::Plaintext => Ok(token),
            Self::Ciphered(cipher) => {
                if token.encrypted_at.is_none() {
                    // Stored before a key was configured; treat as plaintext.
                    return Ok(token);
                }
                token.access_token = cipher.decrypt(&token.access_token)?;
                if let Some(refresh) = token.refresh_token.take() {
                    token.refresh_token = Some(cipher.decrypt(&refresh)?);
                }
                token.encrypted_at = None;
                Ok(token)
            }
        }
    }

    /// Seal and persist a token row; records `encryptedAt`.
    pub async fn store(
        &self,
        adapter: &dyn DatabaseAdapter,
        token: ConsentToken,
    ) -> Result<(), GatewayError> {
        let sealed = self.seal(token)?;
        adapter.store_consent_tokens(sealed).await?;
        Ok(())
    }

    /// Load and decipher the token row for `consent_id`.
    ///
    /// A ciphertext error surfaces as a 500-class failure; there is no
    /// plaintext fall-back.
    pub async fn load(
        &self,
        adapter: &dyn DatabaseAdapter,
        consent_id: Uuid,
    ) -> Result<Option<ConsentToken>, GatewayError> {
        let Some(stored) = adapter.get_consent_tokens(consent_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.open(stored)?))
    }

    /// When stored tokens were last ciphered, for diagnostics.
    pub fn encrypted_at(token: &ConsentToken) -> Option<DateTime<Utc>> {
        token.encrypted_at
    }
}

//! Session management
//!
//! Sessions live server-side in the `sessions` table. The client holds a
//! random token wrapped in an HMAC signature:
//!
//! Token format: base64(token).base64(hmac_sha256(base64(token)))
//!
//! Only the SHA-256 of the raw token is stored.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::data::{Database, Identity, SessionRecord, hash_session_token};
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const SESSION_TOKEN_BYTES: usize = 32;

/// Sign an arbitrary value
///
/// # Returns
/// `"{base64(value)}.{base64(hmac)}"`
pub fn sign_value(value: &str, secret: &str) -> Result<String, AppError> {
    let payload_b64 = URL_SAFE_NO_PAD.encode(value.as_bytes());

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify a value produced by [`sign_value`] and return the original
///
/// # Errors
/// `Unauthorized` for malformed input, `InvalidSignature` when the HMAC does
/// not match.
pub fn verify_signed_value(signed: &str, secret: &str) -> Result<String, AppError> {
    let (payload_b64, signature_b64) = signed.split_once('.').ok_or(AppError::Unauthorized)?;
    if signature_b64.contains('.') {
        return Err(AppError::Unauthorized);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;
    mac.verify_slice(&signature)
        .map_err(|_| AppError::InvalidSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;
    String::from_utf8(payload).map_err(|_| AppError::Unauthorized)
}

fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues, restores and revokes sessions
pub struct SessionManager {
    db: Arc<Database>,
    secret: String,
    max_age: Duration,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, secret: impl Into<String>, max_age: Duration) -> Self {
        Self {
            db,
            secret: secret.into(),
            max_age,
        }
    }

    /// Create a session for a freshly resolved identity
    ///
    /// # Returns
    /// Signed token to hand to the client
    pub async fn on_login_success(&self, identity: &Identity) -> Result<String, AppError> {
        let token = generate_token();
        let now = Utc::now();
        let record = SessionRecord {
            token_hash: hash_session_token(&token),
            identity_id: identity.id.clone(),
            created_at: now,
            expires_at: now + self.max_age,
        };
        self.db.insert_session(&record).await?;

        crate::metrics::SESSIONS_CREATED_TOTAL.inc();
        tracing::debug!(identity_id = %identity.id, "Session created");

        sign_value(&token, &self.secret)
    }

    /// Restore the identity behind a client token
    ///
    /// Unknown, tampered, expired or orphaned tokens yield `Ok(None)`; only
    /// store failures are errors.
    pub async fn restore(&self, signed_token: &str) -> Result<Option<Identity>, AppError> {
        let Ok(token) = verify_signed_value(signed_token, &self.secret) else {
            return Ok(None);
        };

        let Some(record) = self.db.get_session(&token).await? else {
            return Ok(None);
        };

        if record.is_expired() {
            return Ok(None);
        }

        let identity = self.db.get_identity(&record.identity_id).await?;
        if identity.is_none() {
            tracing::warn!(
                identity_id = %record.identity_id,
                "Session references a missing identity"
            );
        }

        Ok(identity)
    }

    /// Invalidate a client token
    ///
    /// # Returns
    /// `true` if a live session was removed, `false` if there was nothing to
    /// invalidate.
    pub async fn logout(&self, signed_token: &str) -> Result<bool, AppError> {
        let Ok(token) = verify_signed_value(signed_token, &self.secret) else {
            return Ok(false);
        };

        let Some(record) = self.db.get_session(&token).await? else {
            return Ok(false);
        };

        let removed = self.db.delete_session(&token).await?;
        Ok(removed && !record.is_expired())
    }

    /// Remove expired sessions
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let purged = self.db.delete_expired_sessions().await?;
        crate::metrics::SESSIONS_PURGED_TOTAL.inc_by(purged);
        Ok(purged)
    }
}

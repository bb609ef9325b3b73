//! Signed connection tokens.
//!
//! Token format: `base64url(user_id|expires_unix_secs|hex(hmac_sha256))`.
//! The auth service and this server share the secret; a token binds a user
//! id to a time window so it can be neither forged nor replayed after expiry.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a token is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not valid base64url")]
    Encoding,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Derives the HMAC key from the configured secret.
///
/// Domain-separated so the same secret can serve other purposes without the
/// tokens becoming interchangeable.
pub fn derive_token_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"likoo-ws-token-v1:");
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    key
}

/// Issues a token for `user_id` valid for `ttl_secs`.
pub fn issue_token(user_id: &str, key: &[u8; 32], ttl_secs: u64) -> String {
    let expires = now_secs().saturating_add(ttl_secs);
    let payload = format!("{}|{}", user_id, expires);
    let signature = hex::encode(sign(payload.as_bytes(), key).finalize().into_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature))
}

/// Verifies a token and returns the user id it was issued for.
pub fn verify_token(token: &str, key: &[u8; 32]) -> Result<String, TokenError> {
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| TokenError::Encoding)?;
    let text = String::from_utf8(decoded).map_err(|_| TokenError::Encoding)?;

    // User ids never contain '|', so split from the right.
    let mut parts = text.rsplitn(3, '|');
    let (Some(sig_hex), Some(expires_str), Some(user_id)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };
    if user_id.is_empty() {
        return Err(TokenError::Malformed);
    }

    let provided = hex::decode(sig_hex).map_err(|_| TokenError::Malformed)?;
    let payload = format!("{}|{}", user_id, expires_str);
    sign(payload.as_bytes(), key)
        .verify_slice(&provided)
        .map_err(|_| TokenError::BadSignature)?;

    let expires: u64 = expires_str.parse().map_err(|_| TokenError::Malformed)?;
    if now_secs() > expires {
        return Err(TokenError::Expired);
    }
    Ok(user_id.to_string())
}

fn sign(payload: &[u8], key: &[u8; 32]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(payload);
    mac
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

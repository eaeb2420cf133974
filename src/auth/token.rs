//! Signed token codec
//!
//! Token format: base64(json payload).base64(hmac_sha256(payload))
//!
//! Used for both session cookies and password reset links.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid HMAC key: {e}")))
}

/// Serialize and sign `claims`
///
/// # Arguments
/// * `claims` - Payload to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_vec(claims).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = mac_for(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify the signature of `token` and decode its payload
///
/// # Returns
/// - `Ok(Some(claims))` if the signature matches and the payload decodes
/// - `Ok(None)` if the token is malformed or the signature does not match
///
/// # Errors
/// Only failures outside the malformed/forged class (the MAC cannot be
/// initialised) are returned as errors.
pub fn open<T: DeserializeOwned>(token: &str, secret: &str) -> Result<Option<T>, AppError> {
    let mut mac = mac_for(secret)?;

    let Some((payload_b64, signature_b64)) = token.split_once('.') else {
        return Ok(None);
    };
    if signature_b64.contains('.') {
        return Ok(None);
    }

    let Ok(signature) = URL_SAFE_NO_PAD.decode(signature_b64) else {
        return Ok(None);
    };

    mac.update(payload_b64.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        return Ok(None);
    }

    let Ok(payload) = URL_SAFE_NO_PAD.decode(payload_b64) else {
        return Ok(None);
    };

    Ok(serde_json::from_slice(&payload).ok())
}

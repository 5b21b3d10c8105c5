//! Minimal JWT payload decoding.
//!
//! The signature is not verified: the token came straight from the Azure CLI
//! and the services validate it anyway. Only the claims needed to recover the
//! tenant and application are read.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};
use serde::Deserialize;

use super::AuthError;

/// Claims read from an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub iss: String,
    pub appid: String,
}

#[derive(Deserialize)]
struct RawClaims {
    iss: Option<String>,
    appid: Option<String>,
}

/// Decode the `iss` and `appid` claims from the payload segment of a JWT.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::ParseError("Access token is not a JWT".to_string()))?;

    let bytes = decode_segment(payload)?;
    let raw: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::ParseError(format!("Invalid token payload: {}", e)))?;

    Ok(TokenClaims {
        iss: raw.iss.ok_or(AuthError::MissingClaim("iss"))?,
        appid: raw.appid.ok_or(AuthError::MissingClaim("appid"))?,
    })
}

/// Tenant id is the second-to-last path segment of the issuer URL,
/// e.g. `https://sts.windows.net/<tenant>/`.
pub fn tenant_from_issuer(issuer: &str) -> Result<String, AuthError> {
    let parts: Vec<&str> = issuer.split('/').collect();
    if parts.len() < 2 {
        return Err(AuthError::ParseError(format!(
            "Unexpected issuer format: {}",
            issuer
        )));
    }

    let tenant = parts[parts.len() - 2];
    if tenant.is_empty() {
        return Err(AuthError::ParseError(format!(
            "No tenant in issuer: {}",
            issuer
        )));
    }

    Ok(tenant.to_string())
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, AuthError> {
    let mut padded = segment.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    URL_SAFE
        .decode(&padded)
        .or_else(|_| STANDARD.decode(&padded))
        .map_err(|e| AuthError::ParseError(format!("Invalid token payload encoding: {}", e)))
}

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The subset of JWT claims the client cares about. Signatures are the
/// server's business; the client only reads expiry to refresh early.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    // Some issuers keep the padding, the URL-safe engine rejects it.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// A token is expired when its `exp` is at or before `now`. Tokens that cannot
/// be decoded count as expired; tokens without `exp` never expire client-side.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    if token.trim().is_empty() {
        return true;
    }

    match decode_claims(token) {
        Some(Claims { exp: Some(exp), .. }) => exp <= now.timestamp(),
        Some(_) => false,
        None => true,
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{}.{}.signature", header, payload)
}

use axum::http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

/// Check `Authorization: Bearer <secret>` against the configured cron secret
///
/// Fails closed when no secret is configured.
pub fn is_authorized(headers: &HeaderMap, secret: Option<&SecretString>) -> bool {
    let Some(secret) = secret else {
        return false;
    };

    let Some(token) = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return false;
    };

    constant_time_eq(token.as_bytes(), secret.expose_secret().as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

//! Signed auth-token cookie handling (spec.md §4.3 "User auth", §6 REST auth
//! endpoints). Adapted from the teacher's `AdminSession` session cookie
//! (`rootsignal-api::auth`): same sign/verify/constant-time-compare shape,
//! generalized from a single admin phone number to a per-user id plus a
//! token version that logout/password-change can bump to invalidate every
//! outstanding session in one statement.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use citescope_core::error::AuthError;

use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const COOKIE_NAME: &str = "token";
const SESSION_DURATION_SECS: i64 = 7 * 24 * 3600;

/// An authenticated request's user id, extracted from the signed cookie.
pub struct AuthedUser {
    pub user_id: i64,
}

impl FromRequestParts<Arc<AppState>> for AuthedUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let cookie_header = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let Some(value) = parse_cookie(cookie_header, COOKIE_NAME) else {
            return Err(auth_error_response(AuthError::MissingToken));
        };

        let Some((user_id, token_version)) = verify_session(value, &state.session_secret) else {
            return Err(auth_error_response(AuthError::MissingToken));
        };

        // A logout or password change bumps `token_version`, invalidating
        // every session signed against the old value in one comparison.
        match state.store.find_user_by_id(user_id).await {
            Ok(Some(row)) if row.token_version == token_version => Ok(AuthedUser { user_id }),
            _ => Err(auth_error_response(AuthError::MissingToken)),
        }
    }
}

/// spec.md §7 "Authentication: missing/invalid token ... → HTTP 403 ...
/// with generic messages."
fn auth_error_response(_err: AuthError) -> Response {
    (StatusCode::FORBIDDEN, "missing or invalid auth token").into_response()
}

/// `user_id|token_version|expiry|signature`
pub fn create_session(user_id: i64, token_version: i32, secret: &str) -> String {
    let expiry = chrono::Utc::now().timestamp() + SESSION_DURATION_SECS;
    let payload = format!("{user_id}|{token_version}|{expiry}");
    let sig = sign(&payload, secret);
    format!("{payload}|{sig}")
}

pub fn session_cookie(user_id: i64, token_version: i32, secret: &str, secure: bool) -> String {
    let value = create_session(user_id, token_version, secret);
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_DURATION_SECS}{secure_flag}"
    )
}

pub fn clear_session_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Verify a session cookie value. Returns `(user_id, token_version)` if the
/// signature, format, and expiry all check out. Token-version agreement
/// against the stored user row is checked separately by the caller.
fn verify_session(value: &str, secret: &str) -> Option<(i64, i32)> {
    let parts: Vec<&str> = value.splitn(4, '|').collect();
    if parts.len() != 4 {
        return None;
    }
    let [user_id_str, version_str, expiry_str, sig] = [parts[0], parts[1], parts[2], parts[3]];

    let payload = format!("{user_id_str}|{version_str}|{expiry_str}");
    let expected_sig = sign(&payload, secret);
    if !constant_time_eq(sig.as_bytes(), expected_sig.as_bytes()) {
        return None;
    }

    let expiry: i64 = expiry_str.parse().ok()?;
    if chrono::Utc::now().timestamp() > expiry {
        return None;
    }

    Some((user_id_str.parse().ok()?, version_str.parse().ok()?))
}

fn sign(payload: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(name) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_session() {
        let secret = "test-secret";
        let value = create_session(42, 0, secret);
        assert_eq!(verify_session(&value, secret), Some((42, 0)));
    }

    #[test]
    fn rejects_tampered_user_id() {
        let secret = "test-secret";
        let value = create_session(42, 0, secret);
        let tampered = value.replacen("42|", "43|", 1);
        assert_eq!(verify_session(&tampered, secret), None);
    }

    #[test]
    fn rejects_stale_token_version() {
        // Both cookies verify fine on their own; the extractor is what
        // rejects the stale one by comparing against the stored version.
        let secret = "test-secret";
        let v0 = create_session(42, 0, secret);
        let v1 = create_session(42, 1, secret);
        assert_eq!(verify_session(&v0, secret), Some((42, 0)));
        assert_eq!(verify_session(&v1, secret), Some((42, 1)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let value = create_session(42, 0, "secret-a");
        assert_eq!(verify_session(&value, "secret-b"), None);
    }

    #[test]
    fn rejects_expired_session() {
        let secret = "test-secret";
        let expiry = chrono::Utc::now().timestamp() - 100;
        let payload = format!("42|0|{expiry}");
        let sig = sign(&payload, secret);
        let value = format!("{payload}|{sig}");
        assert_eq!(verify_session(&value, secret), None);
    }

    #[test]
    fn parse_cookie_finds_named_value_among_others() {
        assert_eq!(parse_cookie("token=abc; other=xyz", "token"), Some("abc"));
        assert_eq!(parse_cookie("other=xyz; token=abc", "token"), Some("abc"));
        assert_eq!(parse_cookie("other=xyz", "token"), None);
    }
}

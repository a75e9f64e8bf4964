use axum::http::{HeaderMap, HeaderValue, header};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "auth-session";
/// Thirty days, in seconds.
pub const SESSION_MAX_AGE: i64 = 60 * 60 * 24 * 30;

/// SessionClaims
///
/// Payload of the `auth-session` cookie. The cookie value is an HS256 token signed
/// with the configured cookie secret, so a client can read but never forge it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub authed: bool,
    pub user_id: i32,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(user_id: i32) -> Self {
        let now = Utc::now().timestamp();
        Self {
            authed: true,
            user_id,
            iat: now,
            exp: now + SESSION_MAX_AGE,
        }
    }
}

/// Signs a fresh session for `user_id`.
pub fn sign_session(secret: &str, user_id: i32) -> AppResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        &SessionClaims::new(user_id),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign session: {}", e)))
}

/// verify_session
///
/// Returns the user id of a valid, unexpired, `authed` session. Any other token
/// (bad signature, expired, malformed, `authed == false`) yields `None`.
pub fn verify_session(secret: &str, token: &str) -> Option<i32> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()?;

    data.claims.authed.then_some(data.claims.user_id)
}

/// Reads a cookie by name from the request's `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// The session token carried by the request, if any.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    read_cookie(headers, SESSION_COOKIE).filter(|v| !v.is_empty())
}

/// `Set-Cookie` value that installs a signed session for `user_id`.
pub fn session_cookie(secret: &str, user_id: i32) -> AppResult<HeaderValue> {
    let token = sign_session(secret, user_id)?;
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE
    ))
    .map_err(|e| AppError::Internal(format!("invalid session cookie: {}", e)))
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("auth-session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Short-lived cookie read once by the frontend to show a success message.
pub fn flash_cookie(message: &str) -> Option<HeaderValue> {
    // Percent-encoded so the value stays a valid cookie octet sequence.
    let encoded: String = message
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect();
    HeaderValue::from_str(&format!(
        "flash_message_success={}; Path=/; SameSite=Lax; Max-Age=60",
        encoded
    ))
    .ok()
}


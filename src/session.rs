//! Signed session tokens and password digests.
//!
//! Replaces ad hoc cookie flags with one HttpOnly `session` cookie holding
//! `base64url(claims-json) . hex(hmac-sha256(secret, payload))`. Claims are
//! verified server-side on every guarded request; a tampered payload or
//! signature fails verification. Passwords are stored as salted SHA-256
//! digests.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{now_ts, Role};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";

/// Who is calling and what role they hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub issued_at: i64,
}

impl SessionClaims {
    pub fn new(user_id: &str, email: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            role,
            issued_at: now_ts(),
        }
    }
}

fn b64() -> base64::engine::general_purpose::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

fn hmac_hex(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Serializes and signs claims into a token.
pub fn sign(secret: &str, claims: &SessionClaims) -> String {
    let json = serde_json::to_string(claims).expect("claims serialize");
    let payload = b64().encode(json.as_bytes());
    let sig = hmac_hex(secret, &payload);
    format!("{}.{}", payload, sig)
}

/// Verifies a token's signature and returns its claims, or `None` for any
/// malformed or tampered token.
pub fn verify(secret: &str, token: &str) -> Option<SessionClaims> {
    let (payload, sig_hex) = token.split_once('.')?;
    let sig = hex::decode(sig_hex).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&sig).ok()?;
    let json = b64().decode(payload.as_bytes()).ok()?;
    serde_json::from_slice(&json).ok()
}

/// `Set-Cookie` value establishing a session.
pub fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token)
}

/// `Set-Cookie` value clearing the session.
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Extracts the session token from a `Cookie` request header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

/// Salted password digest. Returns `(digest_hex, salt_hex)`; the salt is 16
/// random bytes.
pub fn hash_password(password: &str) -> (String, String) {
    let salt = *uuid::Uuid::new_v4().as_bytes();
    let salt_hex = hex::encode(salt);
    (digest_with_salt(password, &salt_hex), salt_hex)
}

pub fn verify_password(password: &str, digest_hex: &str, salt_hex: &str) -> bool {
    digest_with_salt(password, salt_hex) == digest_hex
}

fn digest_with_salt(password: &str, salt_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

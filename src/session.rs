//! Session tokens, password hashing and auth cookies.
//!
//! # Token format
//!
//! ```text
//! base64url(json claims) "." hex(hmac_sha256(secret, base64url(json claims)))
//! ```
//!
//! Claims carry the user id, email and issue/expiry timestamps (Unix
//! seconds). Verification checks the signature in constant time, then the
//! expiry.
//!
//! # Password format
//!
//! `$sha256$iterations$salt_hex$hash_hex`, where the hash is SHA-256
//! iterated over `salt || password`.

use anyhow::{bail, Context, Result};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

const PASSWORD_SCHEME: &str = "sha256";
const PASSWORD_ITERATIONS: u32 = 10_000;
pub const MIN_PASSWORD_LEN: usize = 8;

// ============ Tokens ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies signed session tokens.
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl SessionSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    /// Reads the secret from the environment variable named in `config`.
    /// Without it a random per-process secret is used, so sessions do not
    /// survive a restart.
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = match std::env::var(&config.secret_env) {
            Ok(s) if !s.is_empty() => s,
            _ => {
                tracing::warn!(
                    var = %config.secret_env,
                    "session secret not set; using an ephemeral secret"
                );
                format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
            }
        };
        Self::new(secret, config.token_ttl_secs)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String> {
        self.issue_at(user_id, email, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, user_id: &str, email: &str, now: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = hex::encode(self.mac(payload.as_bytes())?.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims> {
        let (payload, signature) = token
            .split_once('.')
            .context("malformed session token")?;
        let signature = hex::decode(signature).context("malformed token signature")?;
        self.mac(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| anyhow::anyhow!("invalid token signature"))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .context("malformed token payload")?;
        let claims: Claims = serde_json::from_slice(&bytes).context("malformed token claims")?;
        if claims.exp <= now {
            bail!("session token expired");
        }
        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("invalid session secret: {}", e))?;
        mac.update(data);
        Ok(mac)
    }
}

// ============ Passwords ============

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4();
    let hash = derive(password, salt.as_bytes(), PASSWORD_ITERATIONS);
    format!(
        "${}${}${}${}",
        PASSWORD_SCHEME,
        PASSWORD_ITERATIONS,
        hex::encode(salt.as_bytes()),
        hex::encode(hash)
    )
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parts: Vec<&str> = stored.split('$').collect();
    if parts.len() != 5 || parts[1] != PASSWORD_SCHEME {
        bail!("Invalid hash format");
    }
    let iterations: u32 = parts[2].parse().context("Invalid iterations")?;
    let salt = hex::decode(parts[3]).context("Invalid salt")?;
    let expected = hex::decode(parts[4]).context("Invalid hash")?;

    let computed = derive(password, &salt, iterations);
    Ok(constant_time_eq(&computed, &expected))
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut state = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        state = Sha256::new()
            .chain_update(salt)
            .chain_update(state)
            .finalize();
    }
    state.to_vec()
}

/// Random 32-byte secret, hex encoded, for links sent by email.
pub fn one_time_token() -> String {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    hex::encode(bytes)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ============ Cookies ============

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(name: &str, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Strict; Max-Age={}",
        name, token, max_age_secs
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie(name: &str) -> String {
    session_cookie(name, "", 0)
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

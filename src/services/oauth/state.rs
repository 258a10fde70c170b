//! Anti-forgery `state` for the OAuth redirect.
//!
//! The value is a short-lived HS256 token bound to the provider name, signed
//! with the credential key under a separate audience so neither token type
//! can stand in for the other. Nothing is stored server-side.
//!
//! The state also carries the local path the browser asked for before it was
//! sent to the login page, so the sign-in can end where it started.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::auth::SigningKey;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("state is missing or malformed")]
    Invalid,
    #[error("state has expired")]
    Expired,
    #[error("state was issued for another provider")]
    ProviderMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateClaims {
    aud: String,
    provider: String,
    nonce: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

/// `raw` if it is a path on this site, `None` for anything that could
/// leave it (absolute URLs, `//host`, backslashes, control characters).
pub fn local_path(raw: &str) -> Option<&str> {
    let ok = raw.starts_with('/')
        && !raw.starts_with("//")
        && !raw.contains('\\')
        && !raw.chars().any(char::is_control)
        && raw.len() <= 2048;
    ok.then_some(raw)
}

#[derive(Clone)]
pub struct StateSigner {
    audience: String,
    ttl_seconds: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for StateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSigner")
            .field("audience", &self.audience)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl StateSigner {
    pub fn new(key: &SigningKey, audience: &str, ttl_seconds: u64) -> Self {
        let audience = format!("{audience}:oauth-state");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            audience,
            ttl_seconds,
            encoding_key: key.encoding_key(),
            decoding_key: key.decoding_key(),
            validation,
        }
    }

    pub fn issue(&self, provider: &str, next: Option<&str>) -> Result<String, AppError> {
        self.issue_at(provider, next, chrono::Utc::now().timestamp())
    }

    /// Non-local `next` values are dropped rather than rejected.
    pub fn issue_at(&self, provider: &str, next: Option<&str>, now: i64) -> Result<String, AppError> {
        let exp = i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                error!(ttl_seconds = self.ttl_seconds, "oauth state expiry out of range");
                AppError::Internal
            })?;

        let claims = StateClaims {
            aud: self.audience.clone(),
            provider: provider.to_string(),
            nonce: Uuid::new_v4().simple().to_string(),
            iat: now,
            exp,
            next: next.and_then(local_path).map(str::to_string),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(
            |e| {
                error!(error = %e, "failed to sign oauth state");
                AppError::Internal
            },
        )
    }

    pub fn verify(&self, provider: &str, raw: &str) -> Result<Option<String>, StateError> {
        self.verify_at(provider, raw, chrono::Utc::now().timestamp())
    }

    /// On success, yields the path to return to after sign-in, if any.
    pub fn verify_at(
        &self,
        provider: &str,
        raw: &str,
        now: i64,
    ) -> Result<Option<String>, StateError> {
        let claims = jsonwebtoken::decode::<StateClaims>(raw.trim(), &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => StateError::Expired,
                _ => StateError::Invalid,
            })?
            .claims;

        if now > claims.exp {
            return Err(StateError::Expired);
        }
        if claims.provider != provider {
            return Err(StateError::ProviderMismatch);
        }
        Ok(claims.next.filter(|n| local_path(n).is_some()))
    }
}

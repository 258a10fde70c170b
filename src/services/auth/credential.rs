use std::collections::BTreeSet;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::error::AppError;

/// HMAC secret shared by everything that signs or verifies tokens.
///
/// Built once from `Config` and injected; never mutated afterwards.
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct SigningKey {
    secret: Arc<[u8]>,
}

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::from(secret.into()),
        }
    }

    pub(crate) fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    pub(crate) fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    #[error("malformed credential")]
    Malformed,
    #[error("invalid credential signature")]
    InvalidSignature,
    #[error("credential expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialClaims {
    iss: String,
    aud: String,
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
    #[serde(default)]
    marks: BTreeSet<String>,
    #[serde(default)]
    committees: BTreeSet<String>,
}

/// A verified credential.
///
/// `marks` and `committees` are the snapshot taken when the token was
/// minted. Privilege changes made later are not visible until the user
/// signs in again, and nothing short of expiry invalidates a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub subject_id: Uuid,
    pub issued_at: i64,
    pub expires_at: i64,
    pub marks: BTreeSet<String>,
    pub committees: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub token: String,
    pub credential: Credential,
}

/// Signs and verifies HS256 credentials.
///
/// Signature checks go through jsonwebtoken's HMAC verify, which compares
/// tags in constant time.
#[derive(Clone)]
pub struct TokenService {
    issuer: String,
    audience: String,
    ttl_seconds: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenService {
    pub fn new(key: &SigningKey, issuer: &str, audience: &str, ttl_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // expiry is checked against an explicit clock in `parse_at`
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl_seconds,
            encoding_key: key.encoding_key(),
            decoding_key: key.decoding_key(),
            validation,
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn issue(
        &self,
        subject_id: Uuid,
        marks: BTreeSet<String>,
        committees: BTreeSet<String>,
    ) -> Result<IssuedCredential, AppError> {
        self.issue_at(subject_id, marks, committees, chrono::Utc::now().timestamp())
    }

    /// Mint a credential valid from `now` for `ttl_seconds`.
    pub fn issue_at(
        &self,
        subject_id: Uuid,
        marks: BTreeSet<String>,
        committees: BTreeSet<String>,
        now: i64,
    ) -> Result<IssuedCredential, AppError> {
        let expires_at = i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                error!(ttl_seconds = self.ttl_seconds, "credential expiry out of range");
                AppError::Internal
            })?;

        let claims = CredentialClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: subject_id.to_string(),
            iat: now,
            exp: expires_at,
            jti: Uuid::new_v4().to_string(),
            marks,
            committees,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign credential");
            AppError::Internal
        })?;

        Ok(IssuedCredential {
            token,
            credential: Credential {
                subject_id,
                issued_at: now,
                expires_at,
                marks: claims.marks,
                committees: claims.committees,
            },
        })
    }

    pub fn parse(&self, raw: &str) -> Result<Credential, CredentialError> {
        self.parse_at(raw, chrono::Utc::now().timestamp())
    }

    /// Verify signature, issuer and audience, then expiry against `now`.
    ///
    /// A credential is valid through its `exp` second inclusive.
    pub fn parse_at(&self, raw: &str, now: i64) -> Result<Credential, CredentialError> {
        let data = jsonwebtoken::decode::<CredentialClaims>(
            raw.trim(),
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => CredentialError::InvalidSignature,
            ErrorKind::ExpiredSignature => CredentialError::Expired,
            _ => CredentialError::Malformed,
        })?;
        let claims = data.claims;

        if claims.exp < claims.iat {
            return Err(CredentialError::Malformed);
        }
        if now > claims.exp {
            return Err(CredentialError::Expired);
        }

        let subject_id = Uuid::parse_str(&claims.sub).map_err(|_| CredentialError::Malformed)?;

        Ok(Credential {
            subject_id,
            issued_at: claims.iat,
            expires_at: claims.exp,
            marks: claims.marks,
            committees: claims.committees,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_tokens() -> TokenService {
        TokenService::new(
            &SigningKey::new("0123456789abcdef0123456789abcdef"),
            "membership-core",
            "membership-web",
            3600,
        )
    }

    pub(crate) fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Replace the first signature character with a different base64url char.
    pub(crate) fn tamper_signature(token: &str) -> String {
        let sig_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.as_bytes().to_vec();
        bytes[sig_start] = if bytes[sig_start] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn parse_returns_what_issue_embedded() {
        let tokens = test_tokens();
        let subject = Uuid::new_v4();

        let issued = tokens
            .issue_at(subject, set(&["recruiter"]), set(&["admin", "top4"]), 1_000)
            .unwrap();
        let parsed = tokens.parse_at(&issued.token, 1_000).unwrap();

        assert_eq!(parsed, issued.credential);
        assert_eq!(parsed.subject_id, subject);
        assert_eq!(parsed.marks, set(&["recruiter"]));
        assert_eq!(parsed.committees, set(&["admin", "top4"]));
        assert_eq!(parsed.expires_at, 4_600);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let tokens = test_tokens();
        let issued = tokens
            .issue_at(Uuid::new_v4(), set(&[]), set(&[]), 1_000)
            .unwrap();
        let exp = issued.credential.expires_at;

        assert!(tokens.parse_at(&issued.token, exp).is_ok());
        assert_eq!(
            tokens.parse_at(&issued.token, exp + 1),
            Err(CredentialError::Expired)
        );
    }

    #[test]
    fn out_of_range_lifetime_fails_to_issue() {
        for ttl in [u64::MAX, i64::MAX as u64] {
            let tokens = TokenService::new(
                &SigningKey::new("0123456789abcdef0123456789abcdef"),
                "membership-core",
                "membership-web",
                ttl,
            );

            assert!(matches!(
                tokens.issue_at(Uuid::new_v4(), set(&[]), set(&[]), 1_000),
                Err(AppError::Internal)
            ));
        }
    }

    #[test]
    fn flipped_signature_is_rejected() {
        let tokens = test_tokens();
        let issued = tokens
            .issue_at(Uuid::new_v4(), set(&["basic"]), set(&[]), 1_000)
            .unwrap();

        assert_eq!(
            tokens.parse_at(&tamper_signature(&issued.token), 1_000),
            Err(CredentialError::InvalidSignature)
        );
    }

    #[test]
    fn token_signed_with_another_key_is_rejected() {
        let rotated = TokenService::new(
            &SigningKey::new("fedcba9876543210fedcba9876543210"),
            "membership-core",
            "membership-web",
            3600,
        );
        let issued = rotated
            .issue_at(Uuid::new_v4(), set(&[]), set(&["admin"]), 1_000)
            .unwrap();

        assert_eq!(
            test_tokens().parse_at(&issued.token, 1_000),
            Err(CredentialError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = test_tokens();

        assert_eq!(tokens.parse_at("", 0), Err(CredentialError::Malformed));
        assert_eq!(
            tokens.parse_at("not.a.jwt", 0),
            Err(CredentialError::Malformed)
        );
    }

    #[test]
    fn foreign_audience_is_malformed() {
        let other = TokenService::new(
            &SigningKey::new("0123456789abcdef0123456789abcdef"),
            "membership-core",
            "some-other-service",
            3600,
        );
        let issued = other
            .issue_at(Uuid::new_v4(), set(&[]), set(&[]), 1_000)
            .unwrap();

        assert_eq!(
            test_tokens().parse_at(&issued.token, 1_000),
            Err(CredentialError::Malformed)
        );
    }

    #[test]
    fn debug_output_hides_key_material() {
        let rendered = format!("{:?}", SigningKey::new("0123456789abcdef0123456789abcdef"));
        assert!(!rendered.contains("0123"));
    }
}

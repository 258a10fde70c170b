use std::collections::BTreeSet;

use tracing::debug;
use uuid::Uuid;

use super::credential::{Credential, TokenService};

/// Who is making the current request.
///
/// Rebuilt from the presented credential on every request; nothing is kept
/// server-side between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: Uuid,
    pub marks: BTreeSet<String>,
    pub committees: BTreeSet<String>,
}

impl From<Credential> for Principal {
    fn from(c: Credential) -> Self {
        Self {
            subject_id: c.subject_id,
            marks: c.marks,
            committees: c.committees,
        }
    }
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(p) => Some(p),
        }
    }
}

pub fn resolve(tokens: &TokenService, raw: Option<&str>) -> Identity {
    resolve_at(tokens, raw, chrono::Utc::now().timestamp())
}

/// Turn an optional raw credential into an identity.
///
/// Absent or unparseable credentials yield `Anonymous`; the parse error is
/// not a request failure. Whether anonymity matters is decided later by the
/// route's authorization stage.
pub fn resolve_at(tokens: &TokenService, raw: Option<&str>, now: i64) -> Identity {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Identity::Anonymous;
    };

    match tokens.parse_at(raw, now) {
        Ok(credential) => Identity::Authenticated(credential.into()),
        Err(err) => {
            debug!(error = %err, "credential rejected, continuing as anonymous");
            Identity::Anonymous
        }
    }
}

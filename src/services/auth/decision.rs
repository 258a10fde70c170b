use std::collections::BTreeSet;

use super::identity::Identity;

/// Marks and committees that satisfy a route.
///
/// Holding any one listed mark, or any one listed committee, is enough.
/// An empty requirement makes the route public.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredAttributes {
    pub marks: BTreeSet<String>,
    pub committees: BTreeSet<String>,
}

impl RequiredAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marks<I, S>(mut self, marks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.marks.extend(marks.into_iter().map(Into::into));
        self
    }

    pub fn committees<I, S>(mut self, committees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.committees.extend(committees.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty() && self.committees.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    InsufficientPrivilege,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::InsufficientPrivilege => "insufficient-privilege",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny(DenyReason),
}

pub fn decide(identity: &Identity, required: &RequiredAttributes) -> AuthDecision {
    if required.is_empty() {
        return AuthDecision::Allow;
    }

    let Some(principal) = identity.principal() else {
        return AuthDecision::Deny(DenyReason::Unauthenticated);
    };

    // an empty side is disjoint from everything, so it never grants access
    let mark_match = !required.marks.is_disjoint(&principal.marks);
    let committee_match = !required.committees.is_disjoint(&principal.committees);

    if mark_match || committee_match {
        AuthDecision::Allow
    } else {
        AuthDecision::Deny(DenyReason::InsufficientPrivilege)
    }
}

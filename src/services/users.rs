/*
 * Responsibility
 * - ExternalIdentity → 内部 subject (marks / committees) の解決
 * - 永続化は範囲外。ここでは trait と in-memory 実装のみを持つ
 */
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::services::oauth::ExternalIdentity;

pub const MARK_BASIC: &str = "basic";
pub const MARK_RECRUITER: &str = "recruiter";
pub const VALID_MARKS: [&str; 2] = [MARK_BASIC, MARK_RECRUITER];

pub const COMMITTEE_ADMIN: &str = "admin";
pub const COMMITTEE_TOP4: &str = "top4";
pub const COMMITTEE_CORPORATE: &str = "corporate";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,
    #[error("invalid mark: {0}")]
    InvalidMark(String),
    #[error("directory backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub subject_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub marks: BTreeSet<String>,
    pub committees: BTreeSet<String>,
}

/// Storage-side collaborator for the auth core.
///
/// `resolve` is the only call the sign-in flow makes; the rest back the
/// user-management routes.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the user behind a provider identity, creating one on first sign-in.
    async fn resolve(&self, identity: &ExternalIdentity) -> Result<UserRecord, DirectoryError>;

    async fn get(&self, subject_id: Uuid) -> Result<UserRecord, DirectoryError>;

    async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError>;

    async fn add_mark(&self, subject_id: Uuid, mark: &str) -> Result<UserRecord, DirectoryError>;

    async fn remove(&self, subject_id: Uuid) -> Result<(), DirectoryError>;
}

/// Process-local directory keyed by lower-cased email.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    bootstrap_admins: BTreeSet<String>,
}

impl InMemoryUserDirectory {
    pub fn new(bootstrap_admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            bootstrap_admins: bootstrap_admins
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn resolve(&self, identity: &ExternalIdentity) -> Result<UserRecord, DirectoryError> {
        let email = identity.email.to_ascii_lowercase();
        let mut users = self.users.write().await;

        if let Some(existing) = users.get(&email) {
            return Ok(existing.clone());
        }

        let mut committees = BTreeSet::new();
        if self.bootstrap_admins.contains(&email) {
            committees.insert(COMMITTEE_ADMIN.to_string());
        }

        let record = UserRecord {
            subject_id: Uuid::new_v4(),
            email: email.clone(),
            display_name: identity.display_name.clone(),
            marks: BTreeSet::new(),
            committees,
        };
        info!(
            subject_id = %record.subject_id,
            provider = %identity.provider,
            "created user on first sign-in"
        );
        users.insert(email, record.clone());
        Ok(record)
    }

    async fn get(&self, subject_id: Uuid) -> Result<UserRecord, DirectoryError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.subject_id == subject_id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn add_mark(&self, subject_id: Uuid, mark: &str) -> Result<UserRecord, DirectoryError> {
        if !VALID_MARKS.contains(&mark) {
            return Err(DirectoryError::InvalidMark(mark.to_string()));
        }

        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|u| u.subject_id == subject_id)
            .ok_or(DirectoryError::NotFound)?;
        user.marks.insert(mark.to_string());
        Ok(user.clone())
    }

    async fn remove(&self, subject_id: Uuid) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, u| u.subject_id != subject_id);

        if users.len() == before {
            Err(DirectoryError::NotFound)
        } else {
            Ok(())
        }
    }
}

use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct MarkRequest {
    pub subject_id: Uuid,
    pub mark: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUserQuery {
    pub subject_id: Uuid,
}

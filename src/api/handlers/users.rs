/*
 * Responsibility
 * - /api/user 系 handler (認可は route table 側の authorize stage で済んでいる前提)
 * - 永続化は UserDirectory に委譲
 */
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::info;

use crate::api::dto::users::{DeleteUserQuery, MarkRequest};
use crate::error::AppError;
use crate::services::auth::Identity;
use crate::services::users::UserRecord;
use crate::state::AppState;

/// The caller's own record.
pub async fn get_user(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UserRecord>, AppError> {
    let principal = identity.principal().ok_or(AppError::Unauthenticated)?;
    let user = state.users.get(principal.subject_id).await?;
    Ok(Json(user))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserRecord>>, AppError> {
    Ok(Json(state.users.list().await?))
}

/// Takes effect at the marked user's next sign-in; credentials already
/// issued keep their snapshot.
pub async fn mark_user(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<MarkRequest>,
) -> Result<Json<UserRecord>, AppError> {
    let user = state.users.add_mark(req.subject_id, &req.mark).await?;

    info!(
        subject_id = %req.subject_id,
        mark = %req.mark,
        by = ?identity.principal().map(|p| p.subject_id),
        "mark added"
    );
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<DeleteUserQuery>,
) -> Result<StatusCode, AppError> {
    state.users.remove(query.subject_id).await?;

    info!(
        subject_id = %query.subject_id,
        by = ?identity.principal().map(|p| p.subject_id),
        "user deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

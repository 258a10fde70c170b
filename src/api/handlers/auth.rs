/*
 * Responsibility
 * - OAuth の 3 endpoint
 *   - GET  /api/auth/{provider}          : provider の authorize URL (state 付き, ?next= を state に載せる) を返す
 *   - GET  /api/auth/{provider}/redirect : provider からの戻り先。code/state を landing page に載せる
 *   - POST /api/auth/{provider}          : state 検証 → code 交換 → user 解決 → credential 発行
 * - cookie はここでは設定しない (API client は token をそのまま受け取る)
 */
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use crate::api::dto::auth::{
    CallbackQuery, NextQuery, RedirectResponse, TokenRequest, TokenResponse,
};
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<NextQuery>,
) -> Result<Json<RedirectResponse>, AppError> {
    state.providers.get(&provider)?;

    let oauth_state = state.oauth_state.issue(&provider, query.next.as_deref())?;
    let url = state.providers.build_redirect_url(&provider, &oauth_state)?;

    Ok(Json(RedirectResponse { url: url.into() }))
}

pub async fn redirect_landing(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if state.providers.get(&provider).is_err() {
        return (StatusCode::NOT_FOUND, state.pages.not_found()).into_response();
    }

    match (query.error, query.code, query.state) {
        (None, Some(code), Some(oauth_state)) if !code.is_empty() && !oauth_state.is_empty() => {
            state
                .pages
                .oauth_landing(&provider, &code, &oauth_state)
                .into_response()
        }
        (error, ..) => {
            warn!(provider = %provider, error = ?error, "provider callback without a usable code");
            (StatusCode::BAD_REQUEST, state.pages.oauth_failed(&provider)).into_response()
        }
    }
}

pub async fn get_token(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    state.providers.get(&provider)?;

    // before any provider traffic
    let next = state
        .oauth_state
        .verify(&provider, &req.state)
        .map_err(|e| {
            warn!(provider = %provider, error = %e, "oauth state rejected");
            AppError::from(e)
        })?;

    let external = state
        .providers
        .handle_callback(&provider, &req.code)
        .await
        .map_err(|e| {
            warn!(provider = %provider, error = %e, "oauth callback failed");
            AppError::from(e)
        })?;

    let user = state.users.resolve(&external).await.map_err(|e| {
        error!(provider = %provider, error = %e, "user lookup failed");
        AppError::from(e)
    })?;

    let issued = state
        .tokens
        .issue(user.subject_id, user.marks, user.committees)?;

    info!(
        subject_id = %user.subject_id,
        provider = %provider,
        expires_at = issued.credential.expires_at,
        "credential issued"
    );

    Ok(Json(TokenResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_in: state.tokens.ttl_seconds(),
        expires_at: issued.credential.expires_at,
        next: next.unwrap_or_else(|| "/".to_string()),
    }))
}

/*
 * Responsibility
 * - HTML page handler (描画は PageRenderer に委譲)
 * - /logout は credential cookie を消して / へ redirect するだけ (token 自体は期限まで有効)
 */
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    routing::{MethodRouter, get},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::api::dto::auth::NextQuery;
use crate::services::auth::Identity;
use crate::services::oauth::state::local_path;
use crate::state::AppState;

/// A named page that shows who is signed in.
pub fn page(title: &'static str) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>, identity: Identity| async move {
        state.pages.page(title, &identity)
    })
}

pub async fn login(State(state): State<AppState>, Query(query): Query<NextQuery>) -> Html<String> {
    let mut providers = state.providers.names();
    providers.sort_unstable();
    let next = query.next.as_deref().and_then(local_path).unwrap_or("/");
    state.pages.login(&providers, next)
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((state.credential_cookie.to_string(), "")).path("/");
    (jar.remove(cookie), Redirect::to("/"))
}

pub async fn not_found(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, state.pages.not_found())
}

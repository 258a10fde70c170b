//! credential (Bearer header / cookie) 検証 → Identity を extensions に入れる
//!
//! - 全リクエストに対して最初に走る (public page も含む)
//! - credential が無い・壊れている・期限切れの場合は Anonymous を入れる。ここでは拒否しない
//! - 拒否するかどうかは route ごとの authorize stage が決める

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::{self, Next},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::services::auth;
use crate::state::AppState;

/// Install the resolver on every route, fallback included.
pub fn apply(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, resolve_context))
}

async fn resolve_context(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let raw = credential_from_headers(req.headers(), &state.credential_cookie);
    let identity = auth::resolve(&state.tokens, raw.as_deref());

    // middleware → extractor / authorize stage への受け渡し
    req.extensions_mut().insert(identity);

    next.run(req).await
}

/// `Authorization: Bearer` wins over the cookie when both are present.
pub fn credential_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().trim().to_string())
        .filter(|t| !t.is_empty())
}

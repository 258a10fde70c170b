use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::services::auth::Identity;

/// Handler で Identity を受け取るための extractor
///
/// context middleware が request.extensions() に insert 済みである前提。
/// 見つからない場合は Anonymous (拒否は authorize stage の責務)
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned().unwrap_or_default())
    }
}

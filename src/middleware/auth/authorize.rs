//! Route-level authorization stages.
//!
//! Both variants read the `Identity` that `context` left in the request
//! extensions, ask the decision engine, and on Allow hand the request on
//! untouched. They differ only in how a Deny is answered:
//!
//! - `api`: JSON error, 401 for anonymous callers and 403 otherwise
//! - `page`: redirect to the login page for anonymous callers, rendered
//!   forbidden page otherwise
//!
//! In both cases the handler never runs on Deny.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::MethodRouter,
};
use tracing::debug;

use crate::error::AppError;
use crate::middleware::chain::Middleware;
use crate::services::auth::{AuthDecision, DenyReason, Identity, RequiredAttributes, decide};
use crate::services::pages::PageRenderer;
use crate::state::AppState;

/// What a page route needs in order to answer a Deny.
#[derive(Clone)]
pub struct PageDenial {
    pub login_path: Arc<str>,
    pub pages: Arc<dyn PageRenderer>,
}

impl From<&AppState> for PageDenial {
    fn from(state: &AppState) -> Self {
        Self {
            login_path: state.login_path.clone(),
            pages: state.pages.clone(),
        }
    }
}

#[derive(Clone)]
struct PageGuard {
    required: Arc<RequiredAttributes>,
    denial: PageDenial,
}

fn decision_for(req: &Request, required: &RequiredAttributes) -> AuthDecision {
    let anonymous = Identity::Anonymous;
    // no resolver in front of us means nobody vouched for the caller
    let identity = req.extensions().get::<Identity>().unwrap_or(&anonymous);
    decide(identity, required)
}

pub fn api<S>(required: RequiredAttributes) -> Middleware<S>
where
    S: Clone + Send + Sync + 'static,
{
    let required = Arc::new(required);
    Box::new(move |route: MethodRouter<S>| {
        route.route_layer(middleware::from_fn_with_state(required, api_guard))
    })
}

pub fn page<S>(required: RequiredAttributes, denial: PageDenial) -> Middleware<S>
where
    S: Clone + Send + Sync + 'static,
{
    let guard = PageGuard {
        required: Arc::new(required),
        denial,
    };
    Box::new(move |route: MethodRouter<S>| {
        route.route_layer(middleware::from_fn_with_state(guard, page_guard))
    })
}

async fn api_guard(
    State(required): State<Arc<RequiredAttributes>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match decision_for(&req, &required) {
        AuthDecision::Allow => Ok(next.run(req).await),
        AuthDecision::Deny(reason) => {
            debug!(path = %req.uri().path(), reason = reason.as_str(), "api request denied");
            Err(AppError::denied(reason))
        }
    }
}

async fn page_guard(State(guard): State<PageGuard>, req: Request, next: Next) -> Response {
    match decision_for(&req, &guard.required) {
        AuthDecision::Allow => next.run(req).await,
        AuthDecision::Deny(DenyReason::Unauthenticated) => {
            debug!(path = %req.uri().path(), "page request unauthenticated, redirecting to login");
            let back: String = url::form_urlencoded::byte_serialize(req.uri().path().as_bytes()).collect();
            Redirect::to(&format!("{}?next={}", guard.denial.login_path, back)).into_response()
        }
        AuthDecision::Deny(DenyReason::InsufficientPrivilege) => {
            debug!(path = %req.uri().path(), "page request forbidden");
            (StatusCode::FORBIDDEN, guard.denial.pages.forbidden()).into_response()
        }
    }
}

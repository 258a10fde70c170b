/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config 読み込み → AppState 生成 → Router 組み立て
 * - Middleware の適用順
 *   - http (request id / trace / body limit / timeout) が最外
 *   - context (credential → Identity) が全 route の手前
 *   - authorize は route table 側で route ごとに付く
 * - axum::serve() で起動 (ctrl-c で graceful shutdown)
 */
use std::{panic, process, time::Duration};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware::{auth::context, http};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG=info,membership_core=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr may be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting membership core in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = AppState::from_config(&config)?;
    let app = build_router(state, Duration::from_secs(config.request_timeout_seconds));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}

pub(crate) fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let router = api::routes(&state).with_state(state.clone());
    let router = context::apply(router, state);
    http::apply(router, request_timeout)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::services::auth::credential::tests::{set, tamper_signature};
    use crate::services::oauth::{ExternalIdentity, GOOD_CODE, mock_google, spawn_mock_provider};
    use crate::state::tests::test_state;

    const ADMIN_EMAIL: &str = "member@example.org";

    fn app(state: &AppState) -> Router {
        build_router(state.clone(), Duration::from_secs(5))
    }

    async fn send(state: &AppState, req: Request<Body>) -> Response {
        app(state).oneshot(req).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn get_bearer(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn get_cookie(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, format!("token={token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(res: &Response) -> &str {
        res.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
    }

    fn token_for(state: &AppState, marks: &[&str], committees: &[&str]) -> String {
        state
            .tokens
            .issue(Uuid::new_v4(), set(marks), set(committees))
            .unwrap()
            .token
    }

    async fn sign_in(state: &AppState) -> String {
        let body = sign_in_from(state, "/api/auth/google").await;
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 86400);
        body["token"].as_str().unwrap().to_string()
    }

    /// Run the browser flow starting at `start` and return the token response.
    async fn sign_in_from(state: &AppState, start: &str) -> Value {
        let res = send(state, get(start)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let url = url::Url::parse(json_body(res).await["url"].as_str().unwrap()).unwrap();
        let oauth_state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let res = send(
            state,
            json_request(
                "POST",
                "/api/auth/google",
                None,
                json!({ "code": GOOD_CODE, "state": oauth_state }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        json_body(res).await
    }

    #[tokio::test]
    async fn sign_in_flow_issues_a_credential_snapshot() {
        let base = spawn_mock_provider().await;
        let state = test_state(vec![mock_google(&base)], &[ADMIN_EMAIL]);

        let token = sign_in(&state).await;
        let subject_id = state.tokens.parse(&token).unwrap().subject_id;

        // bootstrap admin, but no mark yet
        let res = send(&state, get_bearer("/api/user/filter", &token)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await[0]["email"], ADMIN_EMAIL);

        let res = send(&state, get_bearer("/api/user", &token)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = send(
            &state,
            json_request(
                "POST",
                "/api/user/mark",
                Some(&token),
                json!({ "subject_id": subject_id, "mark": "basic" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        // the credential already issued does not see the new mark
        let res = send(&state, get_bearer("/api/user", &token)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let fresh = sign_in(&state).await;
        let res = send(&state, get_bearer("/api/user", &fresh)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["subject_id"], subject_id.to_string());
        assert_eq!(body["marks"], json!(["basic"]));

        // the same credential works as a cookie on pages
        let res = send(&state, get_cookie("/intranet/usermanager", &fresh)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(text_body(res).await.contains(&subject_id.to_string()));
    }

    #[tokio::test]
    async fn sign_in_returns_to_the_page_that_asked_for_it() {
        let base = spawn_mock_provider().await;
        let state = test_state(vec![mock_google(&base)], &[]);

        let res = send(&state, get("/resumebook")).await;
        assert_eq!(location(&res), "/login?next=%2Fresumebook");

        let res = send(&state, get("/login?next=%2Fresumebook")).await;
        assert!(text_body(res).await.contains("data-next=\"/resumebook\""));

        let body = sign_in_from(&state, "/api/auth/google?next=%2Fresumebook").await;
        assert_eq!(body["next"], "/resumebook");

        let body = sign_in_from(&state, "/api/auth/google").await;
        assert_eq!(body["next"], "/");

        let body = sign_in_from(&state, "/api/auth/google?next=https%3A%2F%2Fevil.example").await;
        assert_eq!(body["next"], "/");

        let res = send(&state, get("/login?next=%2F%2Fevil.example")).await;
        assert!(text_body(res).await.contains("data-next=\"/\""));
    }

    #[tokio::test]
    async fn token_exchange_rejects_forged_and_mismatched_state() {
        let base = spawn_mock_provider().await;
        let state = test_state(vec![mock_google(&base)], &[]);

        let res = send(
            &state,
            json_request(
                "POST",
                "/api/auth/google",
                None,
                json!({ "code": GOOD_CODE, "state": "not-a-state" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"]["code"], "INVALID_STATE");

        let github_state = state.oauth_state.issue("github", None).unwrap();
        let res = send(
            &state,
            json_request(
                "POST",
                "/api/auth/google",
                None,
                json!({ "code": GOOD_CODE, "state": github_state }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"]["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn token_exchange_reports_rejected_code() {
        let base = spawn_mock_provider().await;
        let state = test_state(vec![mock_google(&base)], &[]);
        let oauth_state = state.oauth_state.issue("google", None).unwrap();

        let res = send(
            &state,
            json_request(
                "POST",
                "/api/auth/google",
                None,
                json!({ "code": "wrong", "state": oauth_state }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await["error"]["code"],
            "PROVIDER_EXCHANGE_FAILED"
        );
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let state = test_state(vec![], &[]);

        let res = send(&state, get("/api/auth/myspace")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"]["code"], "UNKNOWN_PROVIDER");

        let res = send(
            &state,
            json_request(
                "POST",
                "/api/auth/myspace",
                None,
                json!({ "code": GOOD_CODE, "state": "x" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn landing_page_carries_code_and_state() {
        let state = test_state(vec![mock_google("http://127.0.0.1:9")], &[]);

        let res = send(&state, get("/api/auth/google/redirect?code=abc&state=xyz")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = text_body(res).await;
        assert!(body.contains("data-code=\"abc\""));
        assert!(body.contains("data-state=\"xyz\""));

        let res = send(&state, get("/api/auth/google/redirect?error=access_denied")).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = send(&state, get("/api/auth/myspace/redirect?code=abc&state=xyz")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_api_call_is_unauthorized() {
        let state = test_state(vec![], &[]);

        let res = send(&state, get("/api/user")).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["error"]["reason"], "unauthenticated");
    }

    #[tokio::test]
    async fn anonymous_page_visit_redirects_to_login() {
        let state = test_state(vec![], &[]);

        let res = send(&state, get("/resumebook")).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login?next=%2Fresumebook");
    }

    #[tokio::test]
    async fn page_access_follows_marks_or_committees() {
        let state = test_state(vec![], &[]);

        let basic = token_for(&state, &["basic"], &[]);
        let res = send(&state, get_cookie("/intranet/usermanager", &basic)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(text_body(res).await.contains("Forbidden"));

        let res = send(&state, get_cookie("/resumebook", &basic)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let recruiter = token_for(&state, &["recruiter"], &[]);
        let res = send(&state, get_cookie("/resumebook", &recruiter)).await;
        assert_eq!(res.status(), StatusCode::OK);

        let corporate = token_for(&state, &[], &["corporate"]);
        let res = send(&state, get_cookie("/intranet/recruitermanager", &corporate)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn broken_credentials_are_treated_as_anonymous() {
        let state = test_state(vec![], &[]);

        let good = token_for(&state, &["basic"], &[]);
        let res = send(&state, get_bearer("/api/user", &tamper_signature(&good))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let long_ago = chrono::Utc::now().timestamp() - 2 * 86400;
        let expired = state
            .tokens
            .issue_at(Uuid::new_v4(), set(&["recruiter"]), set(&[]), long_ago)
            .unwrap()
            .token;
        let res = send(&state, get_cookie("/resumebook", &expired)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);

        // public pages still render
        let res = send(&state, get_cookie("/", &expired)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn only_admins_delete_users() {
        let state = test_state(vec![], &[]);
        let user = state
            .users
            .resolve(&ExternalIdentity {
                provider: "google".to_string(),
                subject: "g-1".to_string(),
                email: "someone@example.org".to_string(),
                display_name: None,
            })
            .await
            .unwrap();
        let uri = format!("/api/user?subject_id={}", user.subject_id);

        let basic = token_for(&state, &["basic"], &[]);
        let req = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {basic}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&state, req).await.status(), StatusCode::FORBIDDEN);

        let top4 = token_for(&state, &[], &["top4"]);
        let req = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {top4}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&state, req).await.status(), StatusCode::NO_CONTENT);
        assert!(state.users.get(user.subject_id).await.is_err());
    }

    #[tokio::test]
    async fn public_pages_and_fallback() {
        let state = test_state(vec![mock_google("http://127.0.0.1:9")], &[]);

        assert_eq!(send(&state, get("/")).await.status(), StatusCode::OK);
        assert_eq!(send(&state, get("/intranet")).await.status(), StatusCode::OK);

        let res = send(&state, get("/login")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(text_body(res).await.contains("data-provider=\"google\""));

        let res = send(&state, get("/no/such/page")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_clears_the_credential_cookie() {
        let state = test_state(vec![], &[]);
        let token = token_for(&state, &["basic"], &[]);

        let res = send(&state, get_cookie("/logout", &token)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/");

        let cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("Max-Age=0"));
    }
}

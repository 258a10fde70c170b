use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::api::handlers::{auth, site, users};
use crate::api::policy;
use crate::middleware::auth::{PageDenial, api, page};
use crate::middleware::chain;
use crate::state::AppState;

/// The route table. Each protected route names its required attributes
/// next to its handler; public routes carry no authorize stage.
pub fn routes(state: &AppState) -> Router<AppState> {
    let denial = PageDenial::from(state);

    Router::new()
        // OAuth
        .route(
            "/api/auth/{provider}",
            get(auth::get_redirect).post(auth::get_token),
        )
        .route("/api/auth/{provider}/redirect", get(auth::redirect_landing))
        // API
        .route(
            "/api/user",
            chain(get(users::get_user), vec![api(policy::member())]).merge(chain(
                delete(users::delete_user),
                vec![api(policy::user_admin())],
            )),
        )
        .route(
            "/api/user/filter",
            chain(get(users::list_users), vec![api(policy::user_directory())]),
        )
        .route(
            "/api/user/mark",
            chain(post(users::mark_user), vec![api(policy::user_admin())]),
        )
        // pages
        .route("/", site::page("Home"))
        .route("/login", get(site::login))
        .route("/logout", get(site::logout))
        .route("/intranet", site::page("Intranet"))
        .route(
            "/resumebook",
            chain(
                site::page("Resume Book"),
                vec![page(policy::resume_book(), denial.clone())],
            ),
        )
        .route(
            "/intranet/usermanager",
            chain(
                site::page("User Manager"),
                vec![page(policy::user_admin(), denial.clone())],
            ),
        )
        .route(
            "/intranet/recruitercreator",
            chain(
                site::page("Recruiter Creator"),
                vec![page(policy::corporate_staff(), denial.clone())],
            ),
        )
        .route(
            "/intranet/recruitermanager",
            chain(
                site::page("Recruiter Manager"),
                vec![page(policy::corporate_staff(), denial.clone())],
            ),
        )
        .route(
            "/intranet/resumemanager",
            chain(
                site::page("Resume Manager"),
                vec![page(policy::corporate_staff(), denial)],
            ),
        )
        .fallback(site::not_found)
}

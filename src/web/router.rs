//! Router configuration.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{account, audit, auth, download, file, team, AppState};
use super::middleware::{
    create_cors_layer, jwt_auth, login_rate_limit, security_headers, unlock_rate_limit,
    RateLimitState,
};

/// Slack on top of the upload limit for multipart framing and form fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the application router.
///
/// `api_timeout` applies to the management API only; retrieval streams may
/// legitimately run longer.
pub fn create_router(
    app_state: AppState,
    rate_limit: Arc<RateLimitState>,
    cors_origins: &[String],
    api_timeout: Duration,
) -> Router {
    let login_limit = rate_limit.clone();
    let auth_routes = Router::new()
        .route(
            "/login",
            post(auth::login).layer(middleware::from_fn(move |req, next| {
                login_rate_limit(login_limit.clone(), req, next)
            })),
        )
        .route("/me", get(auth::me));

    let upload_limit = usize::try_from(app_state.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let file_routes = Router::new()
        .route(
            "/",
            get(file::list_files)
                .post(file::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/:id", get(file::get_file).delete(file::delete_file))
        .route("/:id/settings", put(file::update_settings))
        .route("/:id/password", get(file::reveal_password))
        .route("/:id/downloads", get(file::list_downloads));

    let team_routes = Router::new()
        .route("/", get(team::list_teams).post(team::create_team))
        .route(
            "/:id/members",
            get(team::list_members).post(team::add_member),
        )
        .route("/:id/members/:user_id", delete(team::remove_member))
        .route(
            "/:id/files",
            get(team::list_team_files).post(team::share_file),
        )
        .route("/:id/files/:file_id", delete(team::unshare_file));

    let admin_routes = Router::new()
        .route("/audit-logs", get(audit::list_audit_logs))
        .route("/audit-logs/export", get(audit::export_audit_logs));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/files", file_routes)
        .nest("/teams", team_routes)
        .route(
            "/account",
            get(account::get_account).delete(account::delete_account),
        )
        .nest("/admin", admin_routes)
        .layer(TimeoutLayer::new(api_timeout));

    let unlock_limit = rate_limit;
    let retrieval_routes = Router::new()
        .route(
            "/d/:id",
            get(download::retrieve_file)
                .post(download::unlock_file)
                .layer(middleware::from_fn(move |req, next| {
                    unlock_rate_limit(unlock_limit.clone(), req, next)
                })),
        )
        .route("/s/:id", get(download::splash));

    let jwt_state = app_state.jwt.clone();

    Router::new()
        .nest("/api", api_routes)
        .merge(retrieval_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

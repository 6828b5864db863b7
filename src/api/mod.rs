pub mod auth;
mod error;
mod repositories;
mod users;
mod webhooks;

pub use error::{ApiError, ErrorCode};

use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/github", get(auth::github_redirect))
        .route("/github/callback", get(auth::github_callback))
        .route("/token", post(auth::token_login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    // Protected routes; handlers authenticate via the AuthUser extractor
    let repo_routes = Router::new()
        .route("/", get(repositories::list))
        .route("/", post(repositories::create))
        .route("/:owner/:repo", get(repositories::get))
        .route("/:owner/:repo", patch(repositories::update))
        .route("/:owner/:repo", delete(repositories::remove))
        .route(
            "/:owner/:repo/collaborators",
            get(repositories::list_collaborators),
        )
        .route(
            "/:owner/:repo/collaborators",
            post(repositories::add_collaborator),
        )
        .route(
            "/:owner/:repo/collaborators/:username",
            delete(repositories::remove_collaborator),
        );

    let user_routes = Router::new()
        .route("/dashboard", get(users::dashboard))
        .route("/activities", get(users::activities))
        .route("/profile", get(users::profile))
        .route("/profile", patch(users::update_profile));

    let webhook_routes = Router::new().route("/github", post(webhooks::github_webhook));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .server
                .frontend_url
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:5173")),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/repositories", repo_routes)
        .nest("/api/users", user_routes)
        .nest("/webhooks", webhook_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

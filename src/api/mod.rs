use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::config::Config;
use crate::constants::uploads::MAX_IMAGE_BYTES;
use crate::services::{CommentService, PostService, UploadStore, UserService};
use crate::state::SharedState;

pub mod auth;
mod avatars;
mod comments;
mod error;
mod observability;
mod posts;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserService> {
        &self.shared.users
    }

    #[must_use]
    pub fn posts(&self) -> &Arc<dyn PostService> {
        &self.shared.posts
    }

    #[must_use]
    pub fn comments(&self) -> &Arc<dyn CommentService> {
        &self.shared.comments
    }

    #[must_use]
    pub fn avatars(&self) -> &UploadStore {
        &self.shared.avatars
    }
}

pub async fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);

    Ok(Arc::new(AppState {
        shared,
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config().clone();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.server.session_timeout_minutes,
        )));

    let api_router = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::check_session))
        .route("/users/profile", get(users::get_profile))
        .route("/users/profile", put(users::update_profile))
        .route("/users/password", put(users::update_password))
        .route("/users/avatar", post(users::upload_avatar))
        .route("/users/avatar", delete(users::remove_avatar))
        .route("/users", get(users::list_users))
        .route("/users/{id}/promote", post(users::promote_user))
        .route("/users/{id}/demote", post(users::demote_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/posts", get(posts::list_posts))
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}", put(posts::edit_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/posts/{id}/comments", get(comments::list_comments))
        .route("/posts/{id}/comments", post(comments::create_comment))
        .route("/comments/{id}", put(comments::edit_comment))
        .route("/comments/{id}", delete(comments::delete_comment))
        .route("/avatars", get(avatars::default_avatar))
        .route("/avatars/{filename}", get(avatars::get_avatar))
        .route("/metrics", get(observability::get_metrics))
        // oversized uploads must reach the size validator for a clean
        // rejection message instead of a bare 413
        .layer(DefaultBodyLimit::max(4 * MAX_IMAGE_BYTES))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if config
        .server
        .cors_allowed_origins
        .contains(&"*".to_string())
    {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .server
            .cors_allowed_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .nest_service(
            "/uploads/posts",
            tower_http::services::ServeDir::new(&config.uploads.posts_path),
        )
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_requests))
}

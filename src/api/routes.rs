//! API Routes
//!
//! Configures the Axum router with all feed endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    ban_handler, bannable_users_handler, create_comment_handler, create_post_handler,
    feed_handler, health_handler, image_handler, post_handler, posts_handler, profile_handler,
    register_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /` - Newest posts
/// - `GET /posts` - Older page, `POST /posts` - Upload
/// - `GET /posts/:id` - Single post
/// - `GET /users/:account_name` - Profile page
/// - `POST /register`, `POST /comments`
/// - `GET|POST /admin/banned` - Moderation
/// - `GET /image/:file` - Post image
/// - `GET /stats`, `GET /health`
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(feed_handler))
        .route("/posts", get(posts_handler).post(create_post_handler))
        .route("/posts/:id", get(post_handler))
        .route("/users/:account_name", get(profile_handler))
        .route("/register", post(register_handler))
        .route("/comments", post(create_comment_handler))
        .route(
            "/admin/banned",
            get(bannable_users_handler).post(ban_handler),
        )
        .route("/image/:file", get(image_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::cache::CacheSet;
    use crate::images::ImageStore;
    use crate::store::MemoryStore;

    fn create_test_app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            CacheSet::new(),
            ImageStore::new(dir.path()),
        );
        (create_router(state), dir)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _dir) = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_feed() {
        let (app, _dir) = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_post_not_found() {
        let (app, _dir) = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/posts/7").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _dir) = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/set").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

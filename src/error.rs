//! Error types for the feed cache
//!
//! Provides unified error handling using thiserror.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == Cache Kind ==
/// Names the entity map a lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    User,
    PostComments,
    AuthorComments,
    PostMime,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheKind::User => "user",
            CacheKind::PostComments => "post comment count",
            CacheKind::AuthorComments => "author comment count",
            CacheKind::PostMime => "post mime",
        };
        f.write_str(name)
    }
}

// == Feed Error Enum ==
/// Error type for request-time operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// A key the loader or a mutator should have seeded is absent
    #[error("{cache} cache has no entry for key {key}")]
    CacheMiss { cache: CacheKind, key: i64 },

    /// Backing store query or write failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Image file could not be read or written
    #[error("Image store error: {0}")]
    Image(#[from] std::io::Error),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Caller lacks the authority for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl FeedError {
    pub fn cache_miss(cache: CacheKind, key: i64) -> Self {
        FeedError::CacheMiss { cache, key }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            FeedError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            FeedError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            FeedError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            FeedError::Store(StoreError::Duplicate(msg)) => (StatusCode::CONFLICT, msg.clone()),
            FeedError::Store(StoreError::MissingRow(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            FeedError::CacheMiss { .. } | FeedError::Store(_) | FeedError::Image(_) => {
                // No partial page is ever rendered; the detail stays in the log.
                error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the feed cache.
pub type Result<T> = std::result::Result<T, FeedError>;

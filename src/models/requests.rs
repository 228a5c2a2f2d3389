//! Request DTOs for the feed API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.
//! Caller identity arrives as a plain user id; authentication happens before
//! a request reaches these handlers.

use serde::Deserialize;

use crate::models::{PostId, UserId};

/// Largest accepted image upload, in bytes.
pub const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Request body for POST /register
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub account_name: String,
    /// Credential hash computed by the authentication layer
    pub passhash: String,
}

impl RegisterRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let name_ok = self.account_name.len() >= 3
            && self
                .account_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !name_ok {
            return Some(
                "Account name must be at least 3 characters of letters, digits or underscores"
                    .to_string(),
            );
        }
        if self.passhash.is_empty() {
            return Some("Credential cannot be empty".to_string());
        }
        None
    }
}

/// Request body for POST /posts
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub body: String,
    /// Upload `Content-Type`, e.g. `image/png`
    pub content_type: String,
    /// Image bytes, base64 encoded
    pub image: String,
}

/// Request body for POST /comments
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub user_id: UserId,
    pub post_id: PostId,
    pub comment: String,
}

/// Request body for POST /admin/banned
#[derive(Debug, Clone, Deserialize)]
pub struct BanRequest {
    pub moderator_id: UserId,
    #[serde(default)]
    pub user_ids: Vec<UserId>,
}

/// Query string for GET /posts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostsQuery {
    /// RFC 3339 timestamp; only posts created at or before it are returned
    pub max_created_at: Option<String>,
}

/// Query string for GET /admin/banned
#[derive(Debug, Clone, Deserialize)]
pub struct ModeratorQuery {
    pub moderator_id: UserId,
}

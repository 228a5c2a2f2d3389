//! Response DTOs for the feed API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::aggregate::PostView;
use crate::cache::{CacheSetStats, CacheStats};
use crate::models::{CommentId, PostId, User};

/// Response body for the feed pages (GET / and GET /posts)
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<PostView>,
}

/// Response body for GET /posts/{id}
#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    pub post: PostView,
}

/// Response body for GET /users/{account_name}
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub posts: Vec<PostView>,
    /// Number of posts the user has made
    pub post_count: usize,
    /// Number of comments the user has written
    pub comment_count: u64,
    /// Number of comments on the user's posts, the user's own included
    pub commented_count: u64,
}

/// Response body for POST /register
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub user: User,
}

/// Response body for POST /posts
#[derive(Debug, Clone, Serialize)]
pub struct PostCreatedResponse {
    pub id: PostId,
    pub image_url: String,
}

/// Response body for POST /comments
#[derive(Debug, Clone, Serialize)]
pub struct CommentCreatedResponse {
    pub id: CommentId,
    pub post_id: PostId,
    pub post_comment_count: u64,
}

/// Response body for GET /admin/banned
#[derive(Debug, Clone, Serialize)]
pub struct BannableUsersResponse {
    pub users: Vec<User>,
}

/// Response body for POST /admin/banned
#[derive(Debug, Clone, Serialize)]
pub struct BanResponse {
    pub banned: usize,
}

/// Counters for one cache map in the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MapStatsResponse {
    pub hits: u64,
    pub misses: u64,
    /// Current number of entries in the map
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for MapStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub users: MapStatsResponse,
    pub post_comments: MapStatsResponse,
    pub author_comments: MapStatsResponse,
    pub post_mime: MapStatsResponse,
}

impl From<CacheSetStats> for StatsResponse {
    fn from(stats: CacheSetStats) -> Self {
        Self {
            users: stats.users.into(),
            post_comments: stats.post_comments.into(),
            author_comments: stats.author_comments.into(),
            post_mime: stats.post_mime.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_stats_hit_rate() {
        let resp = MapStatsResponse::from(CacheStats {
            hits: 80,
            misses: 20,
            total_entries: 100,
        });
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_map_stats_zero_requests() {
        let resp = MapStatsResponse::from(CacheStats::default());
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_stats_response_serialize() {
        let resp = StatsResponse::from(CacheSetStats::default());
        let json = serde_json::to_value(&resp).unwrap();
        for key in ["users", "post_comments", "author_comments", "post_mime"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}

//! Backing Store Module
//!
//! The durable side of the system. The cache layer only talks to it through
//! [`BackingStore`]; connection handling and query dialect live behind the
//! trait.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    CommentId, CommentRow, NewComment, NewPost, NewUser, PostId, PostRow, PostSeed, User, UserId,
};

pub use memory::{MemoryStore, Seed, SeedComment, SeedPost};

// == Store Error ==
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    /// A unique constraint rejected the write
    #[error("duplicate value: {0}")]
    Duplicate(String),

    /// A referenced row does not exist
    #[error("missing row: {0}")]
    MissingRow(String),

    /// Any other query failure
    #[error("query failed: {0}")]
    Query(String),
}

// == Backing Store ==
/// Parameterised queries issued by the cache layer and its callers.
///
/// Every write returns only after it is durable; the caller applies the
/// matching cache change afterwards.
#[async_trait]
pub trait BackingStore: Send + Sync + 'static {
    // -- bulk reads, used once at startup --

    /// Every post with its comment count and raw image bytes.
    async fn load_post_seeds(&self) -> Result<Vec<PostSeed>, StoreError>;

    /// Every user row, banned users included.
    async fn load_users(&self) -> Result<Vec<User>, StoreError>;

    /// Comment counts grouped by author. Users without comments are absent.
    async fn load_author_comment_counts(&self) -> Result<Vec<(UserId, u64)>, StoreError>;

    // -- request-time reads --

    /// The `limit` newest comments on a post, newest first.
    async fn recent_comments(
        &self,
        post_id: PostId,
        limit: usize,
    ) -> Result<Vec<CommentRow>, StoreError>;

    /// Newest posts by non-banned authors, optionally no newer than
    /// `max_created_at`.
    async fn latest_posts(
        &self,
        limit: usize,
        max_created_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<PostRow>, StoreError>;

    /// Newest posts of one author.
    async fn posts_by_user(&self, user_id: UserId, limit: usize)
        -> Result<Vec<PostRow>, StoreError>;

    /// A single post, unless its author is banned.
    async fn post_by_id(&self, id: PostId) -> Result<Option<PostRow>, StoreError>;

    async fn post_ids_by_user(&self, user_id: UserId) -> Result<Vec<PostId>, StoreError>;

    /// A non-banned user by account name.
    async fn active_user_by_account_name(&self, name: &str)
        -> Result<Option<User>, StoreError>;

    async fn account_name_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Ordinary, non-banned users, newest first.
    async fn bannable_users(&self) -> Result<Vec<User>, StoreError>;

    // -- writes --

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn insert_post(&self, post: NewPost) -> Result<PostId, StoreError>;

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentId, StoreError>;

    /// Sets the ban flag on every listed user and hides their posts from
    /// feed queries.
    async fn ban_users(&self, ids: &[UserId]) -> Result<(), StoreError>;
}

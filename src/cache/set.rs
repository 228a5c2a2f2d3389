//! Cache Set Module
//!
//! The process-wide group of entity maps. One `CacheSet` is built by the
//! loader and then shared by handle with every request handler.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CacheStats, EntityMap};
use crate::error::{CacheKind, FeedError, Result};
use crate::models::{ImageMime, PostId, User, UserId};

/// `UserId -> User`, banned users included.
pub type UserCache = EntityMap<UserId, Arc<User>>;
/// `PostId -> number of comments on the post`.
pub type PostCommentCache = EntityMap<PostId, u64>;
/// `UserId -> number of comments the user has written`.
pub type AuthorCommentCache = EntityMap<UserId, u64>;
/// `PostId -> image type`, written once per post.
pub type PostMimeCache = EntityMap<PostId, ImageMime>;

// == Cache Set ==
#[derive(Debug, Default)]
pub struct CacheSet {
    pub users: UserCache,
    pub post_comments: PostCommentCache,
    pub author_comments: AuthorCommentCache,
    pub post_mime: PostMimeCache,
}

/// Statistics for every map in a [`CacheSet`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheSetStats {
    pub users: CacheStats,
    pub post_comments: CacheStats,
    pub author_comments: CacheStats,
    pub post_mime: CacheStats,
}

impl CacheSet {
    /// Creates an empty set. Only the loader and tests start from here.
    pub fn new() -> Self {
        Self::default()
    }

    // == Typed Lookups ==
    // A miss on any of these means the key was never seeded; callers report it
    // instead of falling back to the store.

    pub fn user(&self, id: UserId) -> Result<Arc<User>> {
        self.users
            .get(&id)
            .ok_or_else(|| FeedError::cache_miss(CacheKind::User, id.0))
    }

    pub fn post_comment_count(&self, id: PostId) -> Result<u64> {
        self.post_comments
            .get(&id)
            .ok_or_else(|| FeedError::cache_miss(CacheKind::PostComments, id.0))
    }

    pub fn author_comment_count(&self, id: UserId) -> Result<u64> {
        self.author_comments
            .get(&id)
            .ok_or_else(|| FeedError::cache_miss(CacheKind::AuthorComments, id.0))
    }

    pub fn post_mime(&self, id: PostId) -> Result<ImageMime> {
        self.post_mime
            .get(&id)
            .ok_or_else(|| FeedError::cache_miss(CacheKind::PostMime, id.0))
    }

    // == Seeding ==

    pub fn put_user(&self, user: User) {
        self.users.set(user.id, Arc::new(user));
    }

    /// Seeds the per-post counter and image type for a post.
    ///
    /// The image type is only written if the post has none yet; an existing
    /// tag is kept as is.
    pub fn seed_post(&self, id: PostId, comment_count: u64, mime: ImageMime) {
        self.post_comments.set(id, comment_count);
        self.post_mime.set_once(id, mime);
    }

    // == Mutations ==

    pub fn increment_post_comments(&self, id: PostId) -> Result<u64> {
        self.post_comments
            .increment(&id)
            .ok_or_else(|| FeedError::cache_miss(CacheKind::PostComments, id.0))
    }

    pub fn increment_author_comments(&self, id: UserId) -> Result<u64> {
        self.author_comments
            .increment(&id)
            .ok_or_else(|| FeedError::cache_miss(CacheKind::AuthorComments, id.0))
    }

    /// Replaces the cached record for `id` with a banned copy.
    ///
    /// Like counter increments this is read-then-store; the record itself is
    /// never mutated in place.
    pub fn mark_banned(&self, id: UserId) -> Result<Arc<User>> {
        let current = self.user(id)?;
        let banned = Arc::new(current.as_ref().clone().into_banned());
        self.users.set(id, banned.clone());
        Ok(banned)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheSetStats {
        CacheSetStats {
            users: self.users.stats(),
            post_comments: self.post_comments.stats(),
            author_comments: self.author_comments.stats(),
            post_mime: self.post_mime.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Authority;
    use chrono::Utc;

    fn user(id: i64, name: &str) -> User {
        User {
            id: UserId(id),
            account_name: name.to_string(),
            passhash: String::new(),
            authority: Authority::Ordinary,
            banned: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_lookup_and_miss() {
        let caches = CacheSet::new();
        caches.put_user(user(1, "alice"));

        assert_eq!(caches.user(UserId(1)).unwrap().account_name, "alice");
        assert!(matches!(
            caches.user(UserId(2)),
            Err(FeedError::CacheMiss {
                cache: CacheKind::User,
                key: 2
            })
        ));
    }

    #[test]
    fn test_post_and_author_counters_do_not_collide() {
        let caches = CacheSet::new();
        caches.seed_post(PostId(1), 5, ImageMime::Png);
        caches.author_comments.set(UserId(1), 0);

        caches.increment_author_comments(UserId(1)).unwrap();

        assert_eq!(caches.post_comment_count(PostId(1)).unwrap(), 5);
        assert_eq!(caches.author_comment_count(UserId(1)).unwrap(), 1);
    }

    #[test]
    fn test_seed_post_never_rewrites_mime() {
        let caches = CacheSet::new();
        caches.seed_post(PostId(9), 0, ImageMime::Jpeg);
        caches.seed_post(PostId(9), 0, ImageMime::Gif);

        assert_eq!(caches.post_mime(PostId(9)).unwrap(), ImageMime::Jpeg);
    }

    #[test]
    fn test_increment_missing_counter_is_cache_miss() {
        let caches = CacheSet::new();
        let err = caches.increment_post_comments(PostId(3)).unwrap_err();
        assert!(matches!(
            err,
            FeedError::CacheMiss {
                cache: CacheKind::PostComments,
                key: 3
            }
        ));
    }

    #[test]
    fn test_mark_banned_swaps_record() {
        let caches = CacheSet::new();
        caches.put_user(user(1, "alice"));
        caches.put_user(user(2, "bob"));

        let before = caches.user(UserId(1)).unwrap();
        caches.mark_banned(UserId(1)).unwrap();

        // The old handle is untouched; only the slot changed.
        assert!(!before.banned);
        assert!(caches.user(UserId(1)).unwrap().banned);
        assert!(!caches.user(UserId(2)).unwrap().banned);
    }

    #[test]
    fn test_stats_cover_every_map() {
        let caches = CacheSet::new();
        caches.put_user(user(1, "alice"));
        let _ = caches.user(UserId(1));
        let _ = caches.post_mime(PostId(1));

        let stats = caches.stats();
        assert_eq!(stats.users.hits, 1);
        assert_eq!(stats.users.total_entries, 1);
        assert_eq!(stats.post_mime.misses, 1);
    }
}

//! Post Aggregation
//!
//! Turns a page of post rows into response-ready views. Counts and user
//! records come from the caches; the only store access is one small
//! recent-comments query per post.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::cache::CacheSet;
use crate::error::Result;
use crate::models::{image_url, CommentId, ImageMime, PostId, PostRow, User, UserId};
use crate::store::BackingStore;

/// Posts on one feed or profile page.
pub const POSTS_PER_PAGE: usize = 20;

/// Comments shown under each post.
pub const RECENT_COMMENT_LIMIT: usize = 3;

// == Views ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub user_id: UserId,
    pub body: String,
    pub mime: ImageMime,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub comment_count: u64,
    /// Up to three most recent comments, oldest first.
    pub comments: Vec<CommentView>,
    pub csrf_token: String,
    /// Filled in by [`attach_authors`] on pages that show the author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

// == Aggregate ==
/// Builds one view per row, in input order.
///
/// Posts by banned authors are not filtered out here; the queries that
/// produce `rows` already exclude them where a page requires it.
///
/// # Errors
/// A missing comment counter or commenter record fails the whole page. So
/// does a failed recent-comments query.
pub async fn aggregate_posts(
    store: &dyn BackingStore,
    caches: &CacheSet,
    rows: Vec<PostRow>,
    csrf_token: &str,
) -> Result<Vec<PostView>> {
    let mut posts = Vec::with_capacity(rows.len());

    for row in rows {
        let comment_count = caches.post_comment_count(row.id).inspect_err(|e| {
            error!("Aggregating post {}: {}", row.id, e);
        })?;

        // Newest three, then flipped so the page reads oldest to newest.
        let mut recent = store.recent_comments(row.id, RECENT_COMMENT_LIMIT).await?;
        recent.reverse();

        let mut comments = Vec::with_capacity(recent.len());
        for comment in recent {
            let user = caches.user(comment.user_id).inspect_err(|e| {
                error!("Aggregating comment {} on post {}: {}", comment.id, row.id, e);
            })?;
            comments.push(CommentView {
                id: comment.id,
                comment: comment.comment,
                created_at: comment.created_at,
                user: user.as_ref().clone(),
            });
        }

        posts.push(PostView {
            image_url: image_url(row.id, row.mime),
            id: row.id,
            user_id: row.user_id,
            body: row.body,
            mime: row.mime,
            created_at: row.created_at,
            comment_count,
            comments,
            csrf_token: csrf_token.to_string(),
            user: None,
        });
    }

    Ok(posts)
}

/// Resolves each post's author from the user cache.
pub fn attach_authors(caches: &CacheSet, posts: &mut [PostView]) -> Result<()> {
    for post in posts.iter_mut() {
        let author = caches.user(post.user_id)?;
        post.user = Some(author.as_ref().clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheKind, FeedError};
    use crate::models::Authority;
    use crate::store::{MemoryStore, Seed, SeedComment, SeedPost};
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn user(id: i64, name: &str, banned: bool) -> User {
        User {
            id: UserId(id),
            account_name: name.to_string(),
            passhash: String::new(),
            authority: Authority::Ordinary,
            banned,
            created_at: at(0),
        }
    }

    fn row(id: i64, user_id: i64) -> PostRow {
        PostRow {
            id: PostId(id),
            user_id: UserId(user_id),
            body: format!("post {}", id),
            mime: ImageMime::Jpeg,
            created_at: at(id),
        }
    }

    /// Post 1 has five comments alternating alice/bob, post 2 has none.
    fn fixture() -> (MemoryStore, CacheSet) {
        let seed = Seed {
            users: vec![user(1, "alice", false), user(2, "bob", true)],
            posts: vec![
                SeedPost {
                    id: PostId(1),
                    user_id: UserId(1),
                    body: "post 1".to_string(),
                    mime: ImageMime::Jpeg,
                    image: None,
                    created_at: at(1),
                },
                SeedPost {
                    id: PostId(2),
                    user_id: UserId(2),
                    body: "post 2".to_string(),
                    mime: ImageMime::Jpeg,
                    image: None,
                    created_at: at(2),
                },
            ],
            comments: (1..=5)
                .map(|i| SeedComment {
                    id: CommentId(i),
                    post_id: PostId(1),
                    user_id: UserId(if i % 2 == 1 { 1 } else { 2 }),
                    comment: format!("comment {}", i),
                    created_at: at(10 + i),
                })
                .collect(),
            ..Seed::default()
        };
        let store = MemoryStore::from_seed(seed).unwrap();

        let caches = CacheSet::new();
        caches.put_user(user(1, "alice", false));
        caches.put_user(user(2, "bob", true));
        caches.seed_post(PostId(1), 5, ImageMime::Jpeg);
        caches.seed_post(PostId(2), 0, ImageMime::Jpeg);
        (store, caches)
    }

    #[tokio::test]
    async fn test_aggregate_keeps_order_and_length() {
        let (store, caches) = fixture();
        let rows = vec![row(2, 2), row(1, 1)];

        let posts = aggregate_posts(&store, &caches, rows, "token").await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, PostId(2));
        assert_eq!(posts[1].id, PostId(1));
        assert!(posts.iter().all(|p| p.csrf_token == "token"));
    }

    #[tokio::test]
    async fn test_aggregate_takes_newest_three_oldest_first() {
        let (store, caches) = fixture();

        let posts = aggregate_posts(&store, &caches, vec![row(1, 1)], "")
            .await
            .unwrap();

        let post = &posts[0];
        assert_eq!(post.comment_count, 5);
        let texts: Vec<&str> = post.comments.iter().map(|c| c.comment.as_str()).collect();
        assert_eq!(texts, vec!["comment 3", "comment 4", "comment 5"]);
        assert_eq!(post.comments[0].user.account_name, "alice");
        assert_eq!(post.comments[1].user.account_name, "bob");
        assert_eq!(post.image_url, "/image/1.jpg");
    }

    #[tokio::test]
    async fn test_aggregate_uses_cached_count_not_store() {
        let (store, caches) = fixture();
        caches.increment_post_comments(PostId(2)).unwrap();

        let posts = aggregate_posts(&store, &caches, vec![row(2, 2)], "")
            .await
            .unwrap();

        assert_eq!(posts[0].comment_count, 1);
        assert!(posts[0].comments.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_keeps_posts_of_banned_authors() {
        let (store, caches) = fixture();

        let posts = aggregate_posts(&store, &caches, vec![row(2, 2)], "")
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_fails_on_missing_count() {
        let (store, caches) = fixture();

        let result = aggregate_posts(&store, &caches, vec![row(1, 1), row(99, 1)], "").await;
        assert!(matches!(
            result,
            Err(FeedError::CacheMiss {
                cache: CacheKind::PostComments,
                key: 99
            })
        ));
    }

    #[tokio::test]
    async fn test_aggregate_fails_on_missing_commenter() {
        let (store, _) = fixture();
        let caches = CacheSet::new();
        caches.put_user(user(1, "alice", false));
        caches.seed_post(PostId(1), 5, ImageMime::Jpeg);

        let result = aggregate_posts(&store, &caches, vec![row(1, 1)], "").await;
        assert!(matches!(
            result,
            Err(FeedError::CacheMiss {
                cache: CacheKind::User,
                key: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_aggregate_fails_when_store_is_down() {
        let (store, caches) = fixture();
        store.set_unavailable(true);

        let result = aggregate_posts(&store, &caches, vec![row(1, 1)], "").await;
        assert!(matches!(result, Err(FeedError::Store(_))));
    }

    #[tokio::test]
    async fn test_aggregate_empty_page() {
        let (store, caches) = fixture();
        let posts = aggregate_posts(&store, &caches, Vec::new(), "").await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_attach_authors() {
        let (store, caches) = fixture();
        let mut posts = aggregate_posts(&store, &caches, vec![row(1, 1), row(2, 2)], "")
            .await
            .unwrap();

        attach_authors(&caches, &mut posts).unwrap();

        assert_eq!(posts[0].user.as_ref().unwrap().account_name, "alice");
        assert!(posts[1].user.as_ref().unwrap().banned);
    }
}

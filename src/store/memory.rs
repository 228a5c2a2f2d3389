//! In-process backing store.
//!
//! Holds the three tables behind a single async `RwLock`, assigns ids the way
//! an auto-increment column would, and can be switched into an unavailable
//! state to exercise failure paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::{BackingStore, StoreError};
use crate::models::{
    Authority, CommentId, CommentRow, ImageMime, NewComment, NewPost, NewUser, PostId, PostRow,
    PostSeed, User, UserId,
};

// == Seed Data ==
/// Initial contents for a [`MemoryStore`], usually read from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub posts: Vec<SeedPost>,
    #[serde(default)]
    pub comments: Vec<SeedComment>,
    /// Highest post id already handed out, as an auto-increment counter
    /// would remember it after deletes.
    #[serde(default)]
    pub last_post_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPost {
    pub id: PostId,
    pub user_id: UserId,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub mime: ImageMime,
    /// Image bytes, base64 encoded.
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedComment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredPost {
    row: PostRow,
    imgdata: Vec<u8>,
    user_banned: bool,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    posts: BTreeMap<PostId, StoredPost>,
    comments: Vec<CommentRow>,
    next_user_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
}

impl Tables {
    fn newest_first<'a, I>(posts: I, limit: usize) -> Vec<PostRow>
    where
        I: Iterator<Item = &'a StoredPost>,
    {
        let mut rows: Vec<PostRow> = posts.map(|p| p.row.clone()).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        rows
    }
}

// == Memory Store ==
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store preloaded with `seed`.
    ///
    /// Posts and comments must reference users and posts present in the seed.
    pub fn from_seed(seed: Seed) -> Result<Self, StoreError> {
        let mut tables = Tables {
            next_post_id: seed.last_post_id,
            ..Tables::default()
        };

        for user in seed.users {
            tables.next_user_id = tables.next_user_id.max(user.id.0);
            tables.users.insert(user.id, user);
        }

        for post in seed.posts {
            let user_banned = tables
                .users
                .get(&post.user_id)
                .map(|u| u.banned)
                .ok_or_else(|| {
                    StoreError::MissingRow(format!("user {} for post {}", post.user_id, post.id))
                })?;
            let imgdata = match post.image {
                Some(encoded) => STANDARD.decode(encoded).map_err(|e| {
                    StoreError::Query(format!("invalid image data for post {}: {}", post.id, e))
                })?,
                None => Vec::new(),
            };
            tables.next_post_id = tables.next_post_id.max(post.id.0);
            tables.posts.insert(
                post.id,
                StoredPost {
                    user_banned,
                    row: PostRow {
                        id: post.id,
                        user_id: post.user_id,
                        body: post.body,
                        mime: post.mime,
                        created_at: post.created_at,
                    },
                    imgdata,
                },
            );
        }

        for comment in seed.comments {
            if !tables.posts.contains_key(&comment.post_id) {
                return Err(StoreError::MissingRow(format!(
                    "post {} for comment {}",
                    comment.post_id, comment.id
                )));
            }
            if !tables.users.contains_key(&comment.user_id) {
                return Err(StoreError::MissingRow(format!(
                    "user {} for comment {}",
                    comment.user_id, comment.id
                )));
            }
            tables.next_comment_id = tables.next_comment_id.max(comment.id.0);
            tables.comments.push(CommentRow {
                id: comment.id,
                post_id: comment.post_id,
                user_id: comment.user_id,
                comment: comment.comment,
                created_at: comment.created_at,
            });
        }

        Ok(Self {
            tables: RwLock::new(tables),
            unavailable: AtomicBool::new(false),
        })
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn load_post_seeds(&self) -> Result<Vec<PostSeed>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        let mut counts: BTreeMap<PostId, u64> = BTreeMap::new();
        for comment in &tables.comments {
            *counts.entry(comment.post_id).or_default() += 1;
        }

        Ok(tables
            .posts
            .values()
            .map(|post| PostSeed {
                id: post.row.id,
                comment_count: counts.get(&post.row.id).copied().unwrap_or(0),
                mime: post.row.mime,
                imgdata: post.imgdata.clone(),
            })
            .collect())
    }

    async fn load_users(&self) -> Result<Vec<User>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.users.values().cloned().collect())
    }

    async fn load_author_comment_counts(&self) -> Result<Vec<(UserId, u64)>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        let mut counts: BTreeMap<UserId, u64> = BTreeMap::new();
        for comment in &tables.comments {
            *counts.entry(comment.user_id).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn recent_comments(
        &self,
        post_id: PostId,
        limit: usize,
    ) -> Result<Vec<CommentRow>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        let mut rows: Vec<CommentRow> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn latest_posts(
        &self,
        limit: usize,
        max_created_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<PostRow>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        let visible = tables.posts.values().filter(|p| {
            !p.user_banned && max_created_at.map_or(true, |max| p.row.created_at <= max)
        });
        Ok(Tables::newest_first(visible, limit))
    }

    async fn posts_by_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<PostRow>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        let owned = tables.posts.values().filter(|p| p.row.user_id == user_id);
        Ok(Tables::newest_first(owned, limit))
    }

    async fn post_by_id(&self, id: PostId) -> Result<Option<PostRow>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        Ok(tables
            .posts
            .get(&id)
            .filter(|p| !p.user_banned)
            .map(|p| p.row.clone()))
    }

    async fn post_ids_by_user(&self, user_id: UserId) -> Result<Vec<PostId>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        Ok(tables
            .posts
            .values()
            .filter(|p| p.row.user_id == user_id)
            .map(|p| p.row.id)
            .collect())
    }

    async fn active_user_by_account_name(
        &self,
        name: &str,
    ) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        Ok(tables
            .users
            .values()
            .find(|u| u.account_name == name && !u.banned)
            .cloned())
    }

    async fn account_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|u| u.account_name == name))
    }

    async fn bannable_users(&self) -> Result<Vec<User>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.authority == Authority::Ordinary && !u.banned)
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.account_name == user.account_name) {
            return Err(StoreError::Duplicate(format!(
                "account name '{}' is taken",
                user.account_name
            )));
        }

        tables.next_user_id += 1;
        let row = User {
            id: UserId(tables.next_user_id),
            account_name: user.account_name,
            passhash: user.passhash,
            authority: Authority::Ordinary,
            banned: false,
            created_at: Utc::now(),
        };
        tables.users.insert(row.id, row.clone());
        debug!("Inserted user {}", row.id);
        Ok(row)
    }

    async fn insert_post(&self, post: NewPost) -> Result<PostId, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&post.user_id) {
            return Err(StoreError::MissingRow(format!("user {}", post.user_id)));
        }

        tables.next_post_id += 1;
        let id = PostId(tables.next_post_id);
        tables.posts.insert(
            id,
            StoredPost {
                row: PostRow {
                    id,
                    user_id: post.user_id,
                    body: post.body,
                    mime: post.mime,
                    created_at: Utc::now(),
                },
                imgdata: post.imgdata,
                user_banned: post.user_banned,
            },
        );
        debug!("Inserted post {}", id);
        Ok(id)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentId, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if !tables.posts.contains_key(&comment.post_id) {
            return Err(StoreError::MissingRow(format!("post {}", comment.post_id)));
        }
        if !tables.users.contains_key(&comment.user_id) {
            return Err(StoreError::MissingRow(format!("user {}", comment.user_id)));
        }

        tables.next_comment_id += 1;
        let id = CommentId(tables.next_comment_id);
        tables.comments.push(CommentRow {
            id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            comment: comment.comment,
            created_at: Utc::now(),
        });
        debug!("Inserted comment {} on post {}", id, comment.post_id);
        Ok(id)
    }

    async fn ban_users(&self, ids: &[UserId]) -> Result<(), StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        for id in ids {
            if let Some(user) = tables.users.get_mut(id) {
                user.banned = true;
            }
        }
        for post in tables.posts.values_mut() {
            if ids.contains(&post.row.user_id) {
                post.user_banned = true;
            }
        }
        Ok(())
    }
}

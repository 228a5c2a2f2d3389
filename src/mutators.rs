//! Write-Through Mutators
//!
//! Each mutating operation first commits to the backing store and only then
//! applies the matching change to the caches. A failed store write returns
//! before any cache is touched, so the caches never advertise a row the store
//! does not have.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::CacheSet;
use crate::error::Result;
use crate::images::ImageStore;
use crate::models::{CommentId, NewComment, NewPost, NewUser, PostId, User, UserId};
use crate::store::BackingStore;

/// Counter values after a comment was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentCounts {
    pub post_comments: u64,
    pub author_comments: u64,
}

// == Write Through ==
#[derive(Clone)]
pub struct WriteThrough {
    store: Arc<dyn BackingStore>,
    caches: Arc<CacheSet>,
    images: ImageStore,
}

impl WriteThrough {
    pub fn new(store: Arc<dyn BackingStore>, caches: Arc<CacheSet>, images: ImageStore) -> Self {
        Self {
            store,
            caches,
            images,
        }
    }

    // == Register User ==
    /// Inserts a user row, then caches the new record and a zero author
    /// counter.
    pub async fn register_user(&self, user: NewUser) -> Result<Arc<User>> {
        let row = self.store.insert_user(user).await?;
        let id = row.id;

        self.caches.put_user(row);
        self.caches.author_comments.set(id, 0);

        info!("Registered user {}", id);
        self.caches.user(id)
    }

    // == Create Post ==
    /// Inserts a post row, seeds its counter and image type, then writes the
    /// image file.
    ///
    /// The image file is written last; if that fails the post and its cache
    /// entries stay in place and the error is returned to the caller.
    pub async fn create_post(&self, post: NewPost) -> Result<PostId> {
        let mime = post.mime;
        let imgdata = post.imgdata.clone();

        let id = self.store.insert_post(post).await?;
        self.caches.seed_post(id, 0, mime);

        self.images.write(id, mime, &imgdata).await?;

        info!("Created post {} ({})", id, mime.mime_type());
        Ok(id)
    }

    // == Create Comment ==
    /// Inserts a comment row, then bumps the post's counter and the author's
    /// counter.
    ///
    /// Both increments are read-modify-write; a concurrent comment on the same
    /// post or by the same author may be lost from the count.
    pub async fn create_comment(&self, comment: NewComment) -> Result<(CommentId, CommentCounts)> {
        let post_id = comment.post_id;
        let user_id = comment.user_id;

        let id = self.store.insert_comment(comment).await?;

        let counts = CommentCounts {
            post_comments: self.caches.increment_post_comments(post_id)?,
            author_comments: self.caches.increment_author_comments(user_id)?,
        };
        Ok((id, counts))
    }

    // == Ban Users ==
    /// Marks every listed user as banned in the store (their posts drop out of
    /// feed queries), then swaps in banned copies of their cached records.
    ///
    /// Every id must have a cached record; an unknown id fails the whole batch
    /// before the store is written.
    pub async fn ban_users(&self, ids: &[UserId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        for &id in ids {
            if let Err(e) = self.caches.user(id) {
                warn!("Refusing to ban user {}: no cached record", id);
                return Err(e);
            }
        }

        self.store.ban_users(ids).await?;

        for &id in ids {
            self.caches.mark_banned(id)?;
        }

        info!("Banned {} users", ids.len());
        Ok(())
    }
}

//! Cache Loader
//!
//! Builds the process-wide [`CacheSet`] from the backing store. This runs once,
//! before the HTTP listener is bound, and any failure stops the process: there
//! is no path that re-reads the store on a cache miss, so a half-filled cache
//! must never serve a request.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::cache::{CacheSet, EntityMap};
use crate::images::ImageStore;
use crate::models::PostId;
use crate::store::{BackingStore, StoreError};

// == Load Error ==
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {stage} from backing store: {source}")]
    Store {
        stage: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("failed to write image file for post {post}: {source}")]
    Image {
        post: PostId,
        #[source]
        source: std::io::Error,
    },
}

/// Row counts seeded by one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub posts: usize,
    pub images_written: usize,
    pub users: usize,
    pub authors_with_comments: usize,
}

// == Cache Loader ==
pub struct CacheLoader {
    store: Arc<dyn BackingStore>,
    images: ImageStore,
}

impl CacheLoader {
    pub fn new(store: Arc<dyn BackingStore>, images: ImageStore) -> Self {
        Self { store, images }
    }

    /// Reads posts, users and per-author comment counts and returns a fully
    /// seeded cache set.
    pub async fn load(&self) -> Result<(CacheSet, LoadReport), LoadError> {
        let mut report = LoadReport::default();

        // Posts, with their comment counts and image payloads.
        let posts = self
            .store
            .load_post_seeds()
            .await
            .map_err(|source| LoadError::Store {
                stage: "posts",
                source,
            })?;
        let caches = CacheSet {
            post_comments: EntityMap::with_capacity(posts.len()),
            post_mime: EntityMap::with_capacity(posts.len()),
            ..CacheSet::new()
        };
        for post in &posts {
            let written = self
                .images
                .materialize_if_missing(post.id, post.mime, &post.imgdata)
                .await
                .map_err(|source| LoadError::Image {
                    post: post.id,
                    source,
                })?;
            if written {
                report.images_written += 1;
            }
            caches.seed_post(post.id, post.comment_count, post.mime);
        }
        report.posts = posts.len();
        info!(
            "Loaded {} posts ({} image files written)",
            report.posts, report.images_written
        );

        // Users. Every user gets an author counter, overwritten below for
        // those who have commented.
        let users = self
            .store
            .load_users()
            .await
            .map_err(|source| LoadError::Store {
                stage: "users",
                source,
            })?;
        report.users = users.len();
        for user in users {
            caches.author_comments.set(user.id, 0);
            caches.put_user(user);
        }
        info!("Loaded {} users", report.users);

        // Comment counts per author.
        let counts = self
            .store
            .load_author_comment_counts()
            .await
            .map_err(|source| LoadError::Store {
                stage: "author comment counts",
                source,
            })?;
        report.authors_with_comments = counts.len();
        for (user_id, count) in counts {
            caches.author_comments.set(user_id, count);
        }
        info!(
            "Loaded comment counts for {} authors",
            report.authors_with_comments
        );

        Ok((caches, report))
    }
}

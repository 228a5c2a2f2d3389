//! Entity records mirrored from the backing store.
//!
//! Identifiers are newtypes so that a post id can never be used to look up a
//! user-keyed counter (and vice versa).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Identifiers ==
/// Primary key of a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Primary key of a post row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

/// Primary key of a comment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// == Authority ==
/// Account authority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    #[default]
    Ordinary,
    Moderator,
}

// == User ==
/// A user account as held by the user cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub account_name: String,
    /// Opaque credential hash produced by the authentication layer.
    #[serde(skip_serializing, default)]
    pub passhash: String,
    #[serde(default)]
    pub authority: Authority,
    #[serde(default)]
    pub banned: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns a copy of this record with the ban flag set.
    pub fn into_banned(mut self) -> Self {
        self.banned = true;
        self
    }

    pub fn is_moderator(&self) -> bool {
        self.authority == Authority::Moderator
    }
}

// == Image MIME ==
/// Image type of a post, fixed when the post is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMime {
    Jpeg,
    Png,
    Gif,
    #[default]
    Unspecified,
}

impl ImageMime {
    /// Maps an upload `Content-Type` header onto a supported image type.
    ///
    /// Matching is by substring, so `image/jpeg; charset=binary` and
    /// `image/pjpeg` both resolve to [`ImageMime::Jpeg`]. Returns `None` for
    /// anything that is not a jpeg, png or gif.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.contains("jpeg") {
            Some(Self::Jpeg)
        } else if content_type.contains("png") {
            Some(Self::Png)
        } else if content_type.contains("gif") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Unspecified => "",
        }
    }

    /// File extension used for the sidecar image file, empty when unknown.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Unspecified => "",
        }
    }
}

/// Public URL of a post's image.
pub fn image_url(id: PostId, mime: ImageMime) -> String {
    match mime.extension() {
        "" => format!("/image/{}", id),
        ext => format!("/image/{}.{}", id, ext),
    }
}

// == Rows ==
/// A post row as selected for a feed, profile or single-post page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRow {
    pub id: PostId,
    pub user_id: UserId,
    pub body: String,
    pub mime: ImageMime,
    pub created_at: DateTime<Utc>,
}

/// A post row joined with its comment count and raw image payload, as read
/// once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSeed {
    pub id: PostId,
    pub comment_count: u64,
    pub mime: ImageMime,
    pub imgdata: Vec<u8>,
}

/// A comment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

// == Inserts ==
#[derive(Debug, Clone)]
pub struct NewUser {
    pub account_name: String,
    pub passhash: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: UserId,
    pub mime: ImageMime,
    pub body: String,
    pub imgdata: Vec<u8>,
    /// Copied from the author's ban flag at insert time.
    pub user_banned: bool,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_id: UserId,
    pub comment: String,
}

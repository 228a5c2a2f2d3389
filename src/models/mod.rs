//! Entity records and request/response models
//!
//! `entities` mirrors the backing store's rows; `requests` and `responses`
//! are the DTOs serialized on the HTTP surface.

pub mod entities;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use entities::{
    image_url, Authority, CommentId, CommentRow, ImageMime, NewComment, NewPost, NewUser, PostId,
    PostRow, PostSeed, User, UserId,
};
pub use requests::{
    BanRequest, CreateCommentRequest, CreatePostRequest, ModeratorQuery, PostsQuery,
    RegisterRequest, UPLOAD_LIMIT,
};
pub use responses::{
    BanResponse, BannableUsersResponse, CommentCreatedResponse, ErrorResponse, FeedResponse,
    HealthResponse, PostCreatedResponse, PostResponse, ProfileResponse, RegisterResponse,
    StatsResponse,
};

//! API Handlers
//!
//! HTTP request handlers for each feed endpoint. Reads go through the
//! aggregation routine; writes go through the write-through mutators.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::aggregate::{aggregate_posts, attach_authors, POSTS_PER_PAGE};
use crate::cache::CacheSet;
use crate::error::{FeedError, Result};
use crate::images::ImageStore;
use crate::models::{
    image_url, BanRequest, BanResponse, BannableUsersResponse, CommentCreatedResponse,
    CreateCommentRequest, CreatePostRequest, FeedResponse, HealthResponse, ImageMime,
    ModeratorQuery, NewComment, NewPost, NewUser, PostCreatedResponse, PostId, PostResponse,
    PostsQuery, ProfileResponse, RegisterRequest, RegisterResponse, StatsResponse, User, UserId,
    UPLOAD_LIMIT,
};
use crate::mutators::WriteThrough;
use crate::store::{BackingStore, StoreError};

/// Header carrying the caller's anti-forgery token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Application state shared across all handlers.
///
/// Cloning is cheap: every field is a handle onto process-wide state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BackingStore>,
    pub caches: Arc<CacheSet>,
    pub images: ImageStore,
    pub writer: WriteThrough,
}

impl AppState {
    /// Creates a new AppState around an already loaded cache set.
    pub fn new(store: Arc<dyn BackingStore>, caches: CacheSet, images: ImageStore) -> Self {
        let caches = Arc::new(caches);
        let writer = WriteThrough::new(store.clone(), caches.clone(), images.clone());
        Self {
            store,
            caches,
            images,
            writer,
        }
    }
}

fn csrf_token(headers: &HeaderMap) -> String {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Looks up the user a request acts as.
///
/// The id arrives from the caller, so an unknown id is refused rather than
/// reported as a cache miss.
fn acting_user(caches: &CacheSet, id: UserId) -> Result<Arc<User>> {
    caches
        .users
        .get(&id)
        .ok_or_else(|| FeedError::Forbidden(format!("unknown user {}", id)))
}

/// Looks up the acting user, who must be a moderator.
fn require_moderator(caches: &CacheSet, id: UserId) -> Result<Arc<User>> {
    let user = acting_user(caches, id)?;
    if !user.is_moderator() {
        return Err(FeedError::Forbidden(format!(
            "user {} is not a moderator",
            id
        )));
    }
    Ok(user)
}

/// Handler for GET /
///
/// Returns the newest visible posts.
pub async fn feed_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FeedResponse>> {
    let rows = state.store.latest_posts(POSTS_PER_PAGE, None).await?;
    let mut posts =
        aggregate_posts(state.store.as_ref(), &state.caches, rows, &csrf_token(&headers)).await?;
    attach_authors(&state.caches, &mut posts)?;

    Ok(Json(FeedResponse { posts }))
}

/// Handler for GET /posts?max_created_at=...
///
/// Returns the page of visible posts created at or before the given time.
pub async fn posts_handler(
    State(state): State<AppState>,
    Query(query): Query<PostsQuery>,
    headers: HeaderMap,
) -> Result<Json<FeedResponse>> {
    let raw = query
        .max_created_at
        .ok_or_else(|| FeedError::InvalidRequest("max_created_at is required".to_string()))?;
    let max_created_at = DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| FeedError::InvalidRequest(format!("invalid max_created_at: {}", e)))?
        .with_timezone(&Utc);

    let rows = state
        .store
        .latest_posts(POSTS_PER_PAGE, Some(max_created_at))
        .await?;
    let mut posts =
        aggregate_posts(state.store.as_ref(), &state.caches, rows, &csrf_token(&headers)).await?;
    attach_authors(&state.caches, &mut posts)?;

    if posts.is_empty() {
        return Err(FeedError::NotFound(format!(
            "no posts at or before {}",
            raw
        )));
    }
    Ok(Json(FeedResponse { posts }))
}

/// Handler for GET /posts/{id}
pub async fn post_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<PostResponse>> {
    let row = state
        .store
        .post_by_id(PostId(id))
        .await?
        .ok_or_else(|| FeedError::NotFound(format!("post {}", id)))?;

    let mut posts = aggregate_posts(
        state.store.as_ref(),
        &state.caches,
        vec![row],
        &csrf_token(&headers),
    )
    .await?;
    attach_authors(&state.caches, &mut posts)?;

    let post = posts
        .pop()
        .ok_or_else(|| FeedError::NotFound(format!("post {}", id)))?;
    Ok(Json(PostResponse { post }))
}

/// Handler for GET /users/{account_name}
///
/// Returns a profile page: the user's newest posts plus comment totals read
/// from the counter caches.
pub async fn profile_handler(
    State(state): State<AppState>,
    Path(account_name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>> {
    let user = state
        .store
        .active_user_by_account_name(&account_name)
        .await?
        .ok_or_else(|| FeedError::NotFound(format!("user '{}'", account_name)))?;

    let rows = state.store.posts_by_user(user.id, POSTS_PER_PAGE).await?;
    let mut posts =
        aggregate_posts(state.store.as_ref(), &state.caches, rows, &csrf_token(&headers)).await?;
    for post in posts.iter_mut() {
        post.user = Some(user.clone());
    }

    let comment_count = state.caches.author_comment_count(user.id)?;

    let post_ids = state.store.post_ids_by_user(user.id).await?;
    let mut commented_count = 0;
    for id in &post_ids {
        commented_count += state.caches.post_comment_count(*id)?;
    }

    Ok(Json(ProfileResponse {
        user,
        posts,
        post_count: post_ids.len(),
        comment_count,
        commented_count,
    }))
}

/// Handler for POST /register
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(FeedError::InvalidRequest(error_msg));
    }

    if state.store.account_name_exists(&req.account_name).await? {
        return Err(StoreError::Duplicate(format!(
            "account name '{}' is taken",
            req.account_name
        ))
        .into());
    }

    let user = state
        .writer
        .register_user(NewUser {
            account_name: req.account_name,
            passhash: req.passhash,
        })
        .await?;

    Ok(Json(RegisterResponse {
        user: user.as_ref().clone(),
    }))
}

/// Handler for POST /posts
///
/// Accepts a base64 encoded jpeg, png or gif of at most 10 MiB.
pub async fn create_post_handler(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<PostCreatedResponse>> {
    let me = acting_user(&state.caches, req.user_id)?;

    let mime = ImageMime::from_content_type(&req.content_type).ok_or_else(|| {
        FeedError::InvalidRequest("Only jpg, png and gif images are accepted".to_string())
    })?;

    let imgdata = STANDARD
        .decode(req.image.as_bytes())
        .map_err(|e| FeedError::InvalidRequest(format!("invalid image encoding: {}", e)))?;
    if imgdata.len() > UPLOAD_LIMIT {
        return Err(FeedError::InvalidRequest(
            "Image exceeds the 10 MiB upload limit".to_string(),
        ));
    }

    let id = state
        .writer
        .create_post(NewPost {
            user_id: me.id,
            mime,
            body: req.body,
            imgdata,
            user_banned: me.banned,
        })
        .await?;

    Ok(Json(PostCreatedResponse {
        id,
        image_url: image_url(id, mime),
    }))
}

/// Handler for POST /comments
pub async fn create_comment_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<CommentCreatedResponse>> {
    let me = acting_user(&state.caches, req.user_id)?;

    let (id, counts) = state
        .writer
        .create_comment(NewComment {
            post_id: req.post_id,
            user_id: me.id,
            comment: req.comment,
        })
        .await?;

    Ok(Json(CommentCreatedResponse {
        id,
        post_id: req.post_id,
        post_comment_count: counts.post_comments,
    }))
}

/// Handler for GET /admin/banned
///
/// Lists the users a moderator may ban.
pub async fn bannable_users_handler(
    State(state): State<AppState>,
    Query(query): Query<ModeratorQuery>,
) -> Result<Json<BannableUsersResponse>> {
    require_moderator(&state.caches, query.moderator_id)?;

    let users = state.store.bannable_users().await?;
    Ok(Json(BannableUsersResponse { users }))
}

/// Handler for POST /admin/banned
pub async fn ban_handler(
    State(state): State<AppState>,
    Json(req): Json<BanRequest>,
) -> Result<Json<BanResponse>> {
    require_moderator(&state.caches, req.moderator_id)?;

    state.writer.ban_users(&req.user_ids).await?;
    Ok(Json(BanResponse {
        banned: req.user_ids.len(),
    }))
}

/// Handler for GET /image/{id}.{ext}
///
/// Serves the image only when the extension matches the post's image type.
pub async fn image_handler(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse> {
    let not_found = || FeedError::NotFound(format!("image {}", file));

    let (id, ext) = file.split_once('.').ok_or_else(not_found)?;
    let id = PostId(id.parse::<i64>().map_err(|_| not_found())?);

    // The id comes straight from the URL, so an unknown post is a 404 here.
    let mime = state.caches.post_mime.get(&id).ok_or_else(not_found)?;
    if mime == ImageMime::Unspecified || mime.extension() != ext {
        return Err(not_found());
    }

    let data = state.images.read(id, mime).await?;
    debug!("Serving image {} ({} bytes)", file, data.len());
    Ok(([(header::CONTENT_TYPE, mime.mime_type())], data))
}

/// Handler for GET /stats
///
/// Returns hit/miss counters and sizes of every cache map.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.caches.stats().into())
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::config::Config;
use crate::db::{Comment, Database, FavoriteArticle, FavoriteDraft, ReactionKind};

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
}

// Error type rendered as the documented JSON body: {error, code, details}
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn field(field: &str, message: &str) -> Self {
        ApiError::Validation {
            message: message.to_string(),
            details: Some(json!({ field: [message] })),
        }
    }

    fn not_found(message: &str) -> Self {
        ApiError::NotFound(message.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::Validation { message, details } => {
                (StatusCode::BAD_REQUEST, message, details)
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({ "error": message, "code": status.as_u16() });
        if let Some(details) = details {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

// Extractor wrappers that route rejections through the same JSON envelope
// as ApiError, so a malformed body, query string, or path id never comes
// back as axum's plain-text default.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::Validation {
                message: rejection.body_text(),
                details: None,
            }),
        }
    }
}

pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::Validation {
                message: rejection.body_text(),
                details: None,
            }),
        }
    }
}

pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(ApiError::Validation {
                message: rejection.body_text(),
                details: None,
            }),
        }
    }
}

fn default_page() -> i64 {
    1
}

/// Clamp pagination parameters to (page, limit, offset). The offset
/// saturates so an absurd page number reads as an empty page instead of
/// overflowing.
fn page_window(page: i64, size: Option<i64>, config: &Config) -> (i64, i64, i64) {
    let page = page.max(1);
    let size = size
        .unwrap_or(config.default_page_size)
        .clamp(1, config.max_page_size);
    (page, size, (page - 1).saturating_mul(size))
}

// --- Favorites ---

#[derive(Debug, Deserialize)]
pub struct ToggleFavoriteRequest {
    pub user_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url_to_image: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ToggleFavoriteResponse {
    pub success: bool,
    pub is_favorite: bool,
    pub action: &'static str,
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ToggleFavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = payload.url.trim();
    if url.is_empty() {
        return Err(ApiError::field("url", "Article url is required"));
    }

    let draft = FavoriteDraft {
        url: url.to_string(),
        title: payload.title,
        description: payload.description,
        url_to_image: payload.url_to_image,
        source_name: payload.source_name,
        published_at: payload.published_at,
    };
    let outcome = state.db.toggle_favorite(payload.user_id, &draft).await?;

    Ok(Json(ToggleFavoriteResponse {
        success: true,
        is_favorite: outcome.is_favorite(),
        action: outcome.action(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FavoritesQuery {
    pub user_id: i64,
    #[serde(default)]
    pub include_comments: bool,
    #[serde(default = "default_page")]
    pub page: i64,
    pub size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteWithComments {
    #[serde(flatten)]
    pub article: FavoriteArticle,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteList {
    pub items: Vec<FavoriteWithComments>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<FavoritesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, size, offset) = page_window(query.page, query.size, &state.config);

    let total = state.db.count_favorites(query.user_id).await?;
    let articles = state.db.get_favorites(query.user_id, size, offset).await?;

    let mut items = Vec::with_capacity(articles.len());
    for article in articles {
        let comments = if query.include_comments {
            state
                .db
                .get_all_comments_for_article(article.id, query.user_id)
                .await?
        } else {
            Vec::new()
        };
        items.push(FavoriteWithComments { article, comments });
    }

    Ok(Json(FavoriteList {
        items,
        total,
        page,
        size,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct FavoriteCheckResponse {
    pub is_favorite: bool,
    pub article_id: Option<i64>,
}

pub async fn check_favorite(
    State(state): State<Arc<AppState>>,
    ApiPath(url): ApiPath<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let favorite = state.db.find_favorite_by_url(query.user_id, &url).await?;

    Ok(Json(FavoriteCheckResponse {
        is_favorite: favorite.is_some(),
        article_id: favorite.map(|f| f.id),
    }))
}

#[derive(Debug, Serialize)]
pub struct FavoriteUrlsResponse {
    pub user_id: i64,
    pub urls: Vec<String>,
    pub total: i64,
}

pub async fn favorite_urls(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let urls = state.db.get_favorite_urls(query.user_id).await?;

    Ok(Json(FavoriteUrlsResponse {
        user_id: query.user_id,
        total: urls.len() as i64,
        urls,
    }))
}

// --- Comments ---

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub user_id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub comment: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentList {
    pub items: Vec<Comment>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    ApiPath(article_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CommentBody>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .get_favorite_for_user(article_id, payload.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found in user's favorites"))?;

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::field("text", "Comment text cannot be empty"));
    }

    let comment = state.db.add_comment(article_id, payload.user_id, text).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            success: true,
            comment,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub user_id: i64,
    #[serde(default = "default_page")]
    pub page: i64,
    pub size: Option<i64>,
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    ApiPath(article_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<CommentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .get_favorite_for_user(article_id, query.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found in user's favorites"))?;

    let (page, size, offset) = page_window(query.page, query.size, &state.config);

    let total = state
        .db
        .count_comments_for_article(article_id, query.user_id)
        .await?;
    let items = state
        .db
        .get_comments_for_article(article_id, query.user_id, size, offset)
        .await?;

    Ok(Json(CommentList {
        items,
        total,
        page,
        size,
    }))
}

/// Comment by id when it belongs to the given user. Absence and foreign
/// ownership look the same to the caller.
async fn owned_comment(db: &Database, comment_id: i64, user_id: i64) -> Result<Comment, ApiError> {
    match db.get_comment(comment_id).await? {
        Some(comment) if comment.user_id == user_id => Ok(comment),
        _ => Err(ApiError::not_found("Comment not found")),
    }
}

pub async fn edit_comment(
    State(state): State<Arc<AppState>>,
    ApiPath(comment_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CommentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut comment = owned_comment(&state.db, comment_id, payload.user_id).await?;

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::field("text", "Comment text cannot be empty"));
    }

    state.db.update_comment_text(comment_id, text).await?;
    comment.text = text.to_string();

    Ok(Json(CommentResponse {
        success: true,
        comment,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    ApiPath(comment_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    owned_comment(&state.db, comment_id, query.user_id).await?;
    state.db.delete_comment(comment_id).await?;

    Ok(Json(DeleteResponse { success: true }))
}

// --- Reactions ---

#[derive(Debug, Deserialize)]
pub struct ReactionToggleRequest {
    pub user_id: i64,
    pub url: String,
    pub reaction_type: String,
}

#[derive(Debug, Serialize)]
pub struct ReactionToggleResponse {
    pub success: bool,
    pub reaction_type: Option<ReactionKind>,
    pub reactions_count: BTreeMap<ReactionKind, i64>,
}

pub async fn toggle_reaction(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ReactionToggleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = payload.url.trim();
    if url.is_empty() {
        return Err(ApiError::field("url", "Article url is required"));
    }
    let kind = ReactionKind::parse(&payload.reaction_type).ok_or_else(|| {
        ApiError::field(
            "reaction_type",
            "Reaction type must be one of: important, interesting, shocking, useful, liked",
        )
    })?;

    let reaction_type = state.db.set_reaction(payload.user_id, url, kind).await?;
    let reactions_count = state.db.reaction_counts(url).await?;

    Ok(Json(ReactionToggleResponse {
        success: true,
        reaction_type,
        reactions_count,
    }))
}

#[derive(Debug, Serialize)]
pub struct ReactionCountsResponse {
    pub url: String,
    pub counts: BTreeMap<ReactionKind, i64>,
    pub total: i64,
}

pub async fn reaction_counts(
    State(state): State<Arc<AppState>>,
    ApiPath(url): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let counts = state.db.reaction_counts(&url).await?;
    let total = counts.values().sum();

    Ok(Json(ReactionCountsResponse { url, counts, total }))
}

// --- Service ---

pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let favorites_count = state.db.total_favorites().await?;
    let comments_count = state.db.total_comments().await?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "database": "sqlite",
        "stats": {
            "favorites_count": favorites_count,
            "comments_count": comments_count,
        },
    })))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/favorites/toggle", post(toggle_favorite))
        .route("/favorites", get(list_favorites))
        .route("/favorites/check/*url", get(check_favorite))
        .route("/favorites/urls", get(favorite_urls))
        .route(
            "/favorites/:article_id/comments",
            post(add_comment).get(list_comments),
        )
        .route(
            "/comments/:comment_id",
            put(edit_comment).delete(delete_comment),
        )
        .route("/reactions/toggle", post(toggle_reaction))
        .route("/reactions/counts/*url", get(reaction_counts))
        .route("/health", get(health))
        .with_state(state)
}

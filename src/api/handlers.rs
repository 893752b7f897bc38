use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::{extract_client_ip, VisitAggregator, VisitEvent};
use crate::auth::MaybeUser;
use crate::config::AnalyticsConfig;
use crate::importer::NewsImporter;
use crate::models::{Article, ArticleUpdate, NewArticle, ReaderVisit};
use crate::storage::{Storage, StorageError};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub aggregator: VisitAggregator,
    pub analytics: AnalyticsConfig,
    pub importer: NewsImporter,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Create a new article
pub async fn create_article(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewArticle>,
) -> Result<(StatusCode, Json<Article>), (StatusCode, Json<ErrorResponse>)> {
    if payload.title.is_empty() || payload.content.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Title and content are required".to_string(),
            }),
        ));
    }

    match state.storage.create_article(&payload).await {
        Ok(article) => Ok((StatusCode::CREATED, Json(article))),
        Err(StorageError::Conflict) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "An article with this title already exists".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to create article: {}", e),
            }),
        )),
    }
}

/// Get an article by id
pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, (StatusCode, Json<ErrorResponse>)> {
    match state.storage.get_article(id).await {
        Ok(Some(article)) => Ok(Json(article)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Article not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to get article: {}", e),
            }),
        )),
    }
}

/// Apply a partial update to an article
pub async fn update_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ArticleUpdate>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.storage.update_article(id, &payload).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Article updated successfully".to_string(),
        })),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Article not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to update article: {}", e),
            }),
        )),
    }
}

/// Delete an article and its visit history
pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.storage.delete_article(id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Article deleted successfully".to_string(),
        })),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Article not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to delete article: {}", e),
            }),
        )),
    }
}

/// List articles, newest first
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Article>>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.clamp(1, 1000);

    match state.storage.list_articles(limit, query.offset.max(0)).await {
        Ok(articles) => Ok(Json(articles)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to list articles: {}", e),
            }),
        )),
    }
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub article: Option<Article>,
}

/// Pull the latest item from the external news feed into storage
pub async fn import_articles(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ImportResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.importer.import_latest(state.storage.as_ref()).await {
        Ok(Some(article)) => Ok((
            StatusCode::CREATED,
            Json(ImportResponse {
                message: "Imported one new article".to_string(),
                article: Some(article),
            }),
        )),
        Ok(None) => Ok((
            StatusCode::OK,
            Json(ImportResponse {
                message: "No new unique articles to add".to_string(),
                article: None,
            }),
        )),
        Err(e) => {
            tracing::error!("News import failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to import articles: {}", e),
                }),
            ))
        }
    }
}

#[derive(Serialize)]
pub struct VisitResponse {
    /// Whether an anonymous visit row was written
    pub recorded: bool,
    /// Whether the visit was also attributed to a logged-in reader
    pub attributed: bool,
}

/// Log a visit to an article.
///
/// The anonymous space is keyed by client IP; when the caller presents a
/// valid bearer token the visit is additionally attributed in the user
/// space. Each space runs its own admission check against the most recent
/// stored visit, so a rapid refresh inside the window writes nothing.
pub async fn log_visit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Extension(MaybeUser(user)): Extension<MaybeUser>,
) -> Result<Json<VisitResponse>, (StatusCode, Json<ErrorResponse>)> {
    let article = state.storage.get_article(id).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to log visit: {}", e),
            }),
        )
    })?;

    if article.is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Article not found".to_string(),
            }),
        ));
    }

    let now = chrono::Utc::now().timestamp();
    let ip = extract_client_ip(&headers, addr.ip(), &state.analytics).to_string();

    let recorded = admit_and_record_ip(&state, id, &ip, now).await.map_err(|e| {
        tracing::error!("Failed to record visit: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to log visit: {}", e),
            }),
        )
    })?;

    let attributed = match user {
        Some(user) => admit_and_record_reader(&state, id, &user.user_id, &user.display_name, now)
            .await
            .map_err(|e| {
                tracing::error!("Failed to attribute visit: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: format!("Failed to log visit: {}", e),
                    }),
                )
            })?,
        None => false,
    };

    Ok(Json(VisitResponse {
        recorded,
        attributed,
    }))
}

async fn admit_and_record_ip(
    state: &AppState,
    article_id: i64,
    ip: &str,
    now: i64,
) -> anyhow::Result<bool> {
    let prior: Vec<VisitEvent> = state
        .storage
        .recent_ip_visits(article_id, ip, 1)
        .await?
        .into_iter()
        .map(VisitEvent::from)
        .collect();

    let candidate = VisitEvent {
        item_id: article_id,
        visitor_key: ip.to_string(),
        occurred_at: now,
        display_name: None,
    };

    if !state.aggregator.should_record(&prior, &candidate, now) {
        return Ok(false);
    }

    state.storage.record_ip_visit(article_id, ip, now).await?;
    Ok(true)
}

async fn admit_and_record_reader(
    state: &AppState,
    article_id: i64,
    user_id: &str,
    user_name: &str,
    now: i64,
) -> anyhow::Result<bool> {
    let prior: Vec<VisitEvent> = state
        .storage
        .recent_reader_visits(article_id, user_id, 1)
        .await?
        .into_iter()
        .map(VisitEvent::from)
        .collect();

    let candidate = VisitEvent {
        item_id: article_id,
        visitor_key: user_id.to_string(),
        occurred_at: now,
        display_name: Some(user_name.to_string()),
    };

    if !state.aggregator.should_record(&prior, &candidate, now) {
        return Ok(false);
    }

    state
        .storage
        .record_reader_visit(&ReaderVisit {
            article_id,
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            occurred_at: now,
        })
        .await?;
    Ok(true)
}

#[derive(Serialize)]
pub struct IpResponse {
    pub ip: String,
}

/// Echo the client address the server attributes visits to
pub async fn client_ip(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<IpResponse> {
    let ip = extract_client_ip(&headers, addr.ip(), &state.analytics);
    Json(IpResponse { ip: ip.to_string() })
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

//! Dashboard and per-article analytics handlers
//!
//! Each handler recomputes from a full visit snapshot, mirroring how the
//! pages consume the data: the store owns durability, the aggregator owns
//! the dedup rules, nothing is cached in between.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::analytics::{DistinctVisitor, VisitEvent};
use crate::models::Article;

use super::handlers::{AppState, ErrorResponse};

/// Largest article set the dashboard will aggregate over in one request.
const DASHBOARD_ARTICLE_LIMIT: i64 = 1000;

#[derive(Serialize)]
pub struct DashboardRow {
    pub id: i64,
    pub title: String,
    pub created_at: i64,
    pub visitor_count: usize,
}

/// One row per article with its unique-visitor count (IP space).
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DashboardRow>>, (StatusCode, Json<ErrorResponse>)> {
    let articles = state
        .storage
        .list_articles(DASHBOARD_ARTICLE_LIMIT, 0)
        .await
        .map_err(internal)?;

    let visits: Vec<VisitEvent> = state
        .storage
        .list_ip_visits()
        .await
        .map_err(internal)?
        .into_iter()
        .map(VisitEvent::from)
        .collect();

    let rows = articles
        .into_iter()
        .map(|article| DashboardRow {
            visitor_count: state.aggregator.count_unique_visitors(&visits, article.id),
            id: article.id,
            title: article.title,
            created_at: article.created_at,
        })
        .collect();

    Ok(Json(rows))
}

#[derive(Serialize)]
pub struct ActivityRow {
    pub article_id: i64,
    pub article_title: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub occurred_at: i64,
}

#[derive(Serialize)]
pub struct ReaderSummary {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Serialize)]
pub struct ActivityResponse {
    pub visits: Vec<ActivityRow>,
    pub readers: Vec<ReaderSummary>,
}

/// Reader activity feed: authenticated visits with window duplicates
/// suppressed, most recent first, plus the distinct readers seen in the
/// retained rows.
pub async fn dashboard_activity(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ActivityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let titles: HashMap<i64, String> = state
        .storage
        .list_articles(DASHBOARD_ARTICLE_LIMIT, 0)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|Article { id, title, .. }| (id, title))
        .collect();

    let events: Vec<VisitEvent> = state
        .storage
        .list_reader_visits()
        .await
        .map_err(internal)?
        .into_iter()
        .map(VisitEvent::from)
        .collect();

    // Dedup in arrival order, then present newest first.
    let mut retained = state.aggregator.suppress_duplicate_visits(&events);
    retained.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

    let mut seen: HashSet<String> = HashSet::new();
    let mut readers = Vec::new();
    for event in &retained {
        if seen.insert(event.visitor_key.clone()) {
            readers.push(ReaderSummary {
                user_id: event.visitor_key.clone(),
                user_name: event.display_name.clone().unwrap_or_default(),
            });
        }
    }

    let visits = retained
        .into_iter()
        .map(|event| ActivityRow {
            article_title: titles.get(&event.item_id).cloned(),
            article_id: event.item_id,
            user_id: event.visitor_key,
            user_name: event.display_name.unwrap_or_default(),
            occurred_at: event.occurred_at,
        })
        .collect();

    Ok(Json(ActivityResponse { visits, readers }))
}

#[derive(Serialize)]
pub struct ArticleStats {
    pub article_id: i64,
    pub unique_visitors: usize,
    pub readers: Vec<DistinctVisitor>,
}

/// Per-article stats: unique anonymous visitors and the distinct
/// authenticated readers.
pub async fn article_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ArticleStats>, (StatusCode, Json<ErrorResponse>)> {
    let article = state.storage.get_article(id).await.map_err(internal)?;
    if article.is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Article not found".to_string(),
            }),
        ));
    }

    let ip_events: Vec<VisitEvent> = state
        .storage
        .list_ip_visits()
        .await
        .map_err(internal)?
        .into_iter()
        .map(VisitEvent::from)
        .collect();

    let reader_events: Vec<VisitEvent> = state
        .storage
        .list_reader_visits()
        .await
        .map_err(internal)?
        .into_iter()
        .map(VisitEvent::from)
        .collect();

    Ok(Json(ArticleStats {
        article_id: id,
        unique_visitors: state.aggregator.count_unique_visitors(&ip_events, id),
        readers: state.aggregator.list_distinct_visitors(&reader_events, id),
    }))
}

fn internal(e: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!("Failed to compute analytics: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Failed to retrieve analytics".to_string(),
        }),
    )
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
    pub tags: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
    pub tags: Option<String>,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
    pub tags: Option<String>,
}

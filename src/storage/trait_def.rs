use crate::models::{Article, ArticleUpdate, IpVisit, NewArticle, ReaderVisit};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("article title already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes)
    async fn init(&self) -> Result<()>;

    /// Create a new article; titles are unique
    async fn create_article(&self, article: &NewArticle) -> StorageResult<Article>;

    /// Get an article by id
    async fn get_article(&self, id: i64) -> Result<Option<Article>>;

    /// Apply a partial update; returns false when the article does not exist
    async fn update_article(&self, id: i64, changes: &ArticleUpdate) -> Result<bool>;

    /// Delete an article and its visit rows
    async fn delete_article(&self, id: i64) -> Result<bool>;

    /// List articles, newest first
    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<Article>>;

    /// All stored titles, for import deduplication
    async fn list_titles(&self) -> Result<Vec<String>>;

    /// Insert an anonymous visit
    async fn record_ip_visit(&self, article_id: i64, ip_address: &str, occurred_at: i64)
        -> Result<()>;

    /// Full anonymous-visit snapshot in insertion order
    async fn list_ip_visits(&self) -> Result<Vec<IpVisit>>;

    /// Most recent anonymous visits for one `(article, ip)` pair, newest first
    async fn recent_ip_visits(
        &self,
        article_id: i64,
        ip_address: &str,
        limit: i64,
    ) -> Result<Vec<IpVisit>>;

    /// Insert an authenticated visit
    async fn record_reader_visit(&self, visit: &ReaderVisit) -> Result<()>;

    /// Full authenticated-visit snapshot in insertion order
    async fn list_reader_visits(&self) -> Result<Vec<ReaderVisit>>;

    /// Most recent authenticated visits for one `(article, user)` pair, newest first
    async fn recent_reader_visits(
        &self,
        article_id: i64,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ReaderVisit>>;
}

use crate::models::{Article, ArticleUpdate, IpVisit, NewArticle, ReaderVisit};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                author TEXT,
                category TEXT,
                image TEXT,
                tags TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article_visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                ip_address TEXT NOT NULL,
                occurred_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_article_visits_key ON article_visits(article_id, ip_address)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reader_visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                occurred_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reader_visits_key ON reader_visits(article_id, user_id)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_article(&self, article: &NewArticle) -> StorageResult<Article> {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| StorageError::Other(e.into()))?
            .as_secs() as i64;

        let result = sqlx::query(
            r#"
            INSERT INTO articles (title, content, author, category, image, tags, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title) DO NOTHING
            "#,
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.author)
        .bind(&article.category)
        .bind(&article.image)
        .bind(&article.tags)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let row = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author, category, image, tags, created_at
            FROM articles
            WHERE title = ?
            "#,
        )
        .bind(&article.title)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(row)
    }

    async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author, category, image, tags, created_at
            FROM articles
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn update_article(&self, id: i64, changes: &ArticleUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET title = COALESCE(?, title),
                content = COALESCE(?, content),
                author = COALESCE(?, author),
                category = COALESCE(?, category),
                image = COALESCE(?, image),
                tags = COALESCE(?, tags)
            WHERE id = ?
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(&changes.author)
        .bind(&changes.category)
        .bind(&changes.image)
        .bind(&changes.tags)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_article(&self, id: i64) -> Result<bool> {
        sqlx::query("DELETE FROM article_visits WHERE article_id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("DELETE FROM reader_visits WHERE article_id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_articles(&self, limit: i64, offset: i64) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author, category, image, tags, created_at
            FROM articles
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn list_titles(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT title FROM articles")
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows.into_iter().map(|(title,)| title).collect())
    }

    async fn record_ip_visit(
        &self,
        article_id: i64,
        ip_address: &str,
        occurred_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO article_visits (article_id, ip_address, occurred_at) VALUES (?, ?, ?)",
        )
        .bind(article_id)
        .bind(ip_address)
        .bind(occurred_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_ip_visits(&self) -> Result<Vec<IpVisit>> {
        let rows = sqlx::query_as::<_, IpVisit>(
            r#"
            SELECT article_id, ip_address, occurred_at
            FROM article_visits
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn recent_ip_visits(
        &self,
        article_id: i64,
        ip_address: &str,
        limit: i64,
    ) -> Result<Vec<IpVisit>> {
        let rows = sqlx::query_as::<_, IpVisit>(
            r#"
            SELECT article_id, ip_address, occurred_at
            FROM article_visits
            WHERE article_id = ? AND ip_address = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(article_id)
        .bind(ip_address)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn record_reader_visit(&self, visit: &ReaderVisit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reader_visits (article_id, user_id, user_name, occurred_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(visit.article_id)
        .bind(&visit.user_id)
        .bind(&visit.user_name)
        .bind(visit.occurred_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_reader_visits(&self) -> Result<Vec<ReaderVisit>> {
        let rows = sqlx::query_as::<_, ReaderVisit>(
            r#"
            SELECT article_id, user_id, user_name, occurred_at
            FROM reader_visits
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn recent_reader_visits(
        &self,
        article_id: i64,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ReaderVisit>> {
        let rows = sqlx::query_as::<_, ReaderVisit>(
            r#"
            SELECT article_id, user_id, user_name, occurred_at
            FROM reader_visits
            WHERE article_id = ? AND user_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}

//! External news feed import
//!
//! Pulls the latest items from a configured news feed API, drops anything
//! whose title is already stored, and inserts the first genuinely new
//! article. One article per run keeps the demo feed from flooding the
//! table.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::config::NewsConfig;
use crate::models::{Article, NewArticle};
use crate::storage::{Storage, StorageError};

pub struct NewsImporter {
    client: Client,
    config: NewsConfig,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    results: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    creator: Option<Vec<String>>,
    image_url: Option<String>,
}

impl NewsImporter {
    pub fn new(config: NewsConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("newsdesk-importer/0.1.0")
            .build()
            .context("failed to build HTTP client for news import")?;

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.feed_url.is_some()
    }

    /// Fetch the feed and store the first article not already present.
    ///
    /// Returns the inserted article, or `None` when every feed item is
    /// already known.
    pub async fn import_latest(&self, storage: &dyn Storage) -> Result<Option<Article>> {
        let Some(feed_url) = self.config.feed_url.as_deref() else {
            bail!("news import is not configured; set NEWS_FEED_URL");
        };

        let mut request = self
            .client
            .get(feed_url)
            .query(&[("q", self.config.query.as_str())]);
        if let Some(api_key) = self.config.api_key.as_deref() {
            request = request.query(&[("apikey", api_key)]);
        }

        let feed: FeedResponse = request
            .send()
            .await
            .context("failed to request news feed")?
            .error_for_status()
            .context("news feed returned an error status")?
            .json()
            .await
            .context("failed to parse news feed response")?;

        let existing: std::collections::HashSet<String> =
            storage.list_titles().await?.into_iter().collect();

        for item in feed.results {
            let Some(title) = item.title.filter(|t| !t.is_empty()) else {
                continue;
            };
            if existing.contains(&title) {
                continue;
            }

            let author = item
                .creator
                .filter(|names| !names.is_empty())
                .map(|names| names.join(", "));

            let article = NewArticle {
                title,
                content: item.description.unwrap_or_default(),
                author,
                category: None,
                image: item.image_url,
                tags: None,
            };

            match storage.create_article(&article).await {
                Ok(stored) => {
                    tracing::info!(article_id = stored.id, title = %stored.title, "imported article from feed");
                    return Ok(Some(stored));
                }
                // Title landed between our snapshot and the insert; try the next item.
                Err(StorageError::Conflict) => continue,
                Err(StorageError::Other(err)) => return Err(err),
            }
        }

        Ok(None)
    }
}

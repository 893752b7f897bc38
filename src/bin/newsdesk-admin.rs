use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use newsdesk::analytics::{VisitAggregator, VisitEvent};
use newsdesk::config::{Config, DatabaseBackend};
use newsdesk::importer::NewsImporter;
use newsdesk::models::NewArticle;
use newsdesk::storage::{PostgresStorage, SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "newsdesk-admin")]
#[command(about = "Newsdesk admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the external news feed and store the first new article
    Import,
    /// Add an article directly
    Add {
        /// Article title (must be unique)
        title: String,
        /// Article body
        content: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Print per-article unique-visitor counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            Arc::new(SqliteStorage::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Import => {
            let importer = NewsImporter::new(config.news.clone())?;
            match importer.import_latest(storage.as_ref()).await? {
                Some(article) => {
                    println!("✓ Imported article #{}: {}", article.id, article.title);
                }
                None => {
                    println!("No new unique articles to add.");
                }
            }
        }
        Commands::Add {
            title,
            content,
            author,
            category,
            image,
            tags,
        } => {
            let article = storage
                .create_article(&NewArticle {
                    title,
                    content,
                    author,
                    category,
                    image,
                    tags,
                })
                .await?;
            println!("✓ Added article #{}: {}", article.id, article.title);
        }
        Commands::Stats => {
            let articles = storage.list_articles(1000, 0).await?;
            if articles.is_empty() {
                println!("No articles found.");
                return Ok(());
            }

            let visits: Vec<VisitEvent> = storage
                .list_ip_visits()
                .await?
                .into_iter()
                .map(VisitEvent::from)
                .collect();

            let aggregator = VisitAggregator::new(config.analytics.dedup_window_secs);

            println!("{:<6} {:<50} {}", "ID", "Title", "Unique Visitors");
            println!("{}", "-".repeat(80));
            for article in articles {
                println!(
                    "{:<6} {:<50} {}",
                    article.id,
                    article.title,
                    aggregator.count_unique_visitors(&visits, article.id)
                );
            }
        }
    }

    Ok(())
}

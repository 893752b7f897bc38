use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub analytics: AnalyticsConfig,
    pub frontend: FrontendConfig,
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Jwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

/// Shared-secret validation of bearer tokens issued by an external identity
/// provider. This service never signs tokens itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Repeat visits by the same identity within this window count as one
    pub dedup_window_secs: i64,

    /// Trailing X-Forwarded-For hops appended by proxies we operate;
    /// 0 disables header-based client IP extraction
    pub trusted_proxy_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Path to directory containing static frontend files
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// External news feed endpoint; import is disabled when unset
    pub feed_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub query: String,
}

impl AnalyticsConfig {
    const fn default_window_secs() -> i64 {
        60
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./newsdesk.db?mode=rwc".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let auth_mode = std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase();

        let auth_mode = match auth_mode.as_str() {
            "none" => AuthMode::None,
            "jwt" => AuthMode::Jwt,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, jwt"
                );
                AuthMode::None
            }
        };

        let jwt = if matches!(auth_mode, AuthMode::Jwt) {
            let secret = std::env::var("AUTH_JWT_SECRET")
                .context("AUTH_JWT_SECRET must be set when AUTH_MODE=jwt")?;
            let issuer = std::env::var("AUTH_JWT_ISSUER")
                .context("AUTH_JWT_ISSUER must be set when AUTH_MODE=jwt")?;
            let audience = std::env::var("AUTH_JWT_AUDIENCE")
                .context("AUTH_JWT_AUDIENCE must be set when AUTH_MODE=jwt")?;

            Some(JwtConfig {
                secret,
                issuer,
                audience,
            })
        } else {
            None
        };

        let dedup_window_secs = std::env::var("VISIT_DEDUP_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or_else(AnalyticsConfig::default_window_secs);

        let trusted_proxy_count = std::env::var("TRUSTED_PROXY_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1);

        let static_dir = std::env::var("FRONTEND_STATIC_DIR").ok();

        let feed_url = std::env::var("NEWS_FEED_URL").ok();
        let api_key = std::env::var("NEWS_FEED_API_KEY").ok();
        let query = std::env::var("NEWS_FEED_QUERY").unwrap_or_else(|_| "technology".to_string());

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            auth: AuthConfig {
                mode: auth_mode,
                jwt,
            },
            analytics: AnalyticsConfig {
                dedup_window_secs,
                trusted_proxy_count,
            },
            frontend: FrontendConfig { static_dir },
            news: NewsConfig {
                feed_url,
                api_key,
                query,
            },
        })
    }
}

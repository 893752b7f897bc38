//! API integration tests against a locally bound server
//!
//! Each test spins up the full router on an ephemeral port with in-memory
//! SQLite and talks to it over HTTP.

use jsonwebtoken::{encode, EncodingKey, Header};
use newsdesk::api;
use newsdesk::auth::AuthService;
use newsdesk::config::{
    AnalyticsConfig, AuthConfig, AuthMode, Config, DatabaseBackend, DatabaseConfig,
    FrontendConfig, JwtConfig, NewsConfig, ServerConfig,
};
use newsdesk::storage::{SqliteStorage, Storage};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

const JWT_SECRET: &str = "integration-test-secret";

fn test_config(auth: AuthConfig) -> Config {
    Config {
        database: DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite::memory:".to_string(),
            // In-memory SQLite is per-connection
            max_connections: 1,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        auth,
        analytics: AnalyticsConfig {
            dedup_window_secs: 60,
            trusted_proxy_count: 1,
        },
        frontend: FrontendConfig { static_dir: None },
        news: NewsConfig {
            feed_url: None,
            api_key: None,
            query: "technology".to_string(),
        },
    }
}

fn jwt_auth() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::Jwt,
        jwt: Some(JwtConfig {
            secret: JWT_SECRET.to_string(),
            issuer: "https://id.example.com".to_string(),
            audience: "newsdesk".to_string(),
        }),
    }
}

fn open_auth() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::None,
        jwt: None,
    }
}

async fn spawn_server(config: Config) -> String {
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections)
            .await
            .unwrap(),
    );
    storage.init().await.unwrap();

    let auth_service = Arc::new(AuthService::new(&config.auth).unwrap());
    let router = api::create_router(storage, auth_service, &config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{}", addr)
}

fn bearer_token(sub: &str, name: &str) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": sub,
            "name": name,
            "iss": "https://id.example.com",
            "aud": "newsdesk",
            "exp": chrono::Utc::now().timestamp() + 3600,
        }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn create_article(client: &reqwest::Client, base: &str, title: &str) -> Value {
    let response = client
        .post(format!("{base}/api/articles"))
        .json(&json!({ "title": title, "content": "body text" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let base = spawn_server(test_config(open_auth())).await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn test_article_crud_flow() {
    let base = spawn_server(test_config(open_auth())).await;
    let client = reqwest::Client::new();

    let created = create_article(&client, &base, "Hello world").await;
    let id = created["id"].as_i64().unwrap();

    // Empty title is rejected
    let bad = client
        .post(format!("{base}/api/articles"))
        .json(&json!({ "title": "", "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);

    // Duplicate title conflicts
    let dup = client
        .post(format!("{base}/api/articles"))
        .json(&json!({ "title": "Hello world", "content": "again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), 409);

    let fetched: Value = client
        .get(format!("{base}/api/articles/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["title"], "Hello world");

    let updated = client
        .put(format!("{base}/api/articles/{id}"))
        .json(&json!({ "content": "edited" }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), 200);

    let listed: Value = client
        .get(format!("{base}/api/articles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["content"], "edited");

    let deleted = client
        .delete(format!("{base}/api/articles/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);

    let missing = client
        .get(format!("{base}/api/articles/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_visit_dedup_within_window() {
    let base = spawn_server(test_config(open_auth())).await;
    let client = reqwest::Client::new();

    let created = create_article(&client, &base, "Tracked").await;
    let id = created["id"].as_i64().unwrap();

    let first: Value = client
        .post(format!("{base}/api/articles/{id}/visits"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["recorded"], true);
    assert_eq!(first["attributed"], false);

    // Same caller inside the window: suppressed
    let second: Value = client
        .post(format!("{base}/api/articles/{id}/visits"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["recorded"], false);

    // A different forwarded client counts separately
    let other: Value = client
        .post(format!("{base}/api/articles/{id}/visits"))
        .header("x-forwarded-for", "203.0.113.9")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(other["recorded"], true);

    let stats: Value = client
        .get(format!("{base}/api/articles/{id}/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["unique_visitors"], 2);

    let dashboard: Value = client
        .get(format!("{base}/api/dashboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = dashboard.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["visitor_count"], 2);
}

#[tokio::test]
async fn test_visit_unknown_article_is_404() {
    let base = spawn_server(test_config(open_auth())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/articles/999/visits"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_client_ip_echo() {
    let base = spawn_server(test_config(open_auth())).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{base}/api/ip"))
        .header("x-forwarded-for", "203.0.113.7")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ip"], "203.0.113.7");
}

#[tokio::test]
async fn test_mutations_require_token_in_jwt_mode() {
    let base = spawn_server(test_config(jwt_auth())).await;
    let client = reqwest::Client::new();

    let denied = client
        .post(format!("{base}/api/articles"))
        .json(&json!({ "title": "Locked", "content": "body" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 401);

    let allowed = client
        .post(format!("{base}/api/articles"))
        .bearer_auth(bearer_token("user-1", "Ada"))
        .json(&json!({ "title": "Locked", "content": "body" }))
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 201);

    // Reads stay public
    let listed = client
        .get(format!("{base}/api/articles"))
        .send()
        .await
        .unwrap();
    assert_eq!(listed.status(), 200);
}

#[tokio::test]
async fn test_authenticated_visits_are_attributed() {
    let base = spawn_server(test_config(jwt_auth())).await;
    let client = reqwest::Client::new();
    let token = bearer_token("user-7", "Grace");

    let created: Value = client
        .post(format!("{base}/api/articles"))
        .bearer_auth(&token)
        .json(&json!({ "title": "Bylines", "content": "body" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();

    let visit: Value = client
        .post(format!("{base}/api/articles/{id}/visits"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(visit["recorded"], true);
    assert_eq!(visit["attributed"], true);

    // Second hit inside the window is suppressed in both spaces
    let repeat: Value = client
        .post(format!("{base}/api/articles/{id}/visits"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(repeat["recorded"], false);
    assert_eq!(repeat["attributed"], false);

    let stats: Value = client
        .get(format!("{base}/api/articles/{id}/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["unique_visitors"], 1);
    assert_eq!(stats["readers"][0]["display_name"], "Grace");

    let activity: Value = client
        .get(format!("{base}/api/dashboard/activity"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(activity["visits"].as_array().unwrap().len(), 1);
    assert_eq!(activity["visits"][0]["article_title"], "Bylines");
    assert_eq!(activity["readers"][0]["user_name"], "Grace");
}

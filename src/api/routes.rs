use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::analytics::VisitAggregator;
use crate::auth::{attach_identity, require_auth, AuthService};
use crate::config::Config;
use crate::importer::NewsImporter;
use crate::storage::Storage;

use super::dashboard::{article_stats, dashboard, dashboard_activity};
use super::handlers::{
    client_ip, create_article, delete_article, get_article, health_check, import_articles,
    list_articles, log_visit, update_article, AppState,
};

pub fn create_router(
    storage: Arc<dyn Storage>,
    auth_service: Arc<AuthService>,
    config: &Config,
) -> anyhow::Result<Router> {
    let importer = NewsImporter::new(config.news.clone())?;

    let state = Arc::new(AppState {
        storage,
        aggregator: VisitAggregator::new(config.analytics.dedup_window_secs),
        analytics: config.analytics.clone(),
        importer,
    });

    let auth_for_mutations = Arc::clone(&auth_service);
    let protected_routes = Router::new()
        .route("/api/articles", post(create_article))
        .route("/api/articles/import", post(import_articles))
        .route("/api/articles/{id}", put(update_article))
        .route("/api/articles/{id}", delete(delete_article))
        .route_layer(middleware::from_fn(move |headers, request, next| {
            let auth = Arc::clone(&auth_for_mutations);
            require_auth(auth, headers, request, next)
        }));

    // Visits stay open to anonymous callers but still see a bearer
    // identity when one is presented.
    let visit_routes = Router::new()
        .route("/api/articles/{id}/visits", post(log_visit))
        .route_layer(middleware::from_fn(move |headers, request, next| {
            let auth = Arc::clone(&auth_service);
            attach_identity(auth, headers, request, next)
        }));

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/ip", get(client_ip))
        .route("/api/articles", get(list_articles))
        .route("/api/articles/{id}", get(get_article))
        .route("/api/articles/{id}/stats", get(article_stats))
        .route("/api/dashboard", get(dashboard))
        .route("/api/dashboard/activity", get(dashboard_activity));

    let mut router = Router::new()
        .merge(public_routes)
        .merge(visit_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(CorsLayer::permissive());

    if let Some(static_dir) = &config.frontend.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    Ok(router)
}

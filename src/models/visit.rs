use serde::Serialize;
use sqlx::FromRow;

/// Anonymous visit row, keyed by IP address.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IpVisit {
    pub article_id: i64,
    pub ip_address: String,
    pub occurred_at: i64,
}

/// Authenticated visit row, keyed by user id.
///
/// `user_name` is denormalized alongside the id so the activity feed can be
/// rendered without a user lookup.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReaderVisit {
    pub article_id: i64,
    pub user_id: String,
    pub user_name: String,
    pub occurred_at: i64,
}

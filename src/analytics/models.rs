//! Data models for visit analytics

use serde::{Deserialize, Serialize};

use crate::models::{IpVisit, ReaderVisit};

/// One recorded access to an article by some visitor identity.
///
/// `visitor_key` is either an IP address string (anonymous visits) or a user
/// id (authenticated visits). The two identity spaces are kept in separate
/// tables and are never mixed in one snapshot; which space an event list
/// belongs to is decided by the caller that fetched it.
///
/// An event with an empty `visitor_key` is malformed. Aggregation operations
/// skip such events silently rather than failing, so partial analytics data
/// never blocks a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    /// Article the visit belongs to
    pub item_id: i64,

    /// Visitor identity within the snapshot's identity space
    pub visitor_key: String,

    /// Unix timestamp of the visit (seconds)
    pub occurred_at: i64,

    /// Human-readable label for the visitor, carried for reporting only
    pub display_name: Option<String>,
}

impl VisitEvent {
    pub fn is_valid(&self) -> bool {
        !self.visitor_key.is_empty()
    }
}

impl From<IpVisit> for VisitEvent {
    fn from(visit: IpVisit) -> Self {
        Self {
            item_id: visit.article_id,
            visitor_key: visit.ip_address,
            occurred_at: visit.occurred_at,
            display_name: None,
        }
    }
}

impl From<ReaderVisit> for VisitEvent {
    fn from(visit: ReaderVisit) -> Self {
        Self {
            item_id: visit.article_id,
            visitor_key: visit.user_id,
            occurred_at: visit.occurred_at,
            display_name: Some(visit.user_name),
        }
    }
}

/// One distinct visitor of an article, with the label taken from the first
/// event observed for that identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistinctVisitor {
    pub visitor_key: String,
    pub display_name: Option<String>,
}

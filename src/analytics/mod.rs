//! Visit analytics module
//!
//! This module holds the visit-deduplication and unique-visitor logic shared
//! by the dashboard, the per-article stats endpoint, and the visit-logging
//! write path.
//!
//! Everything here is pure and synchronous: operations take a fully
//! materialized snapshot of visit events and return fresh values. Fetching
//! the snapshot and writing admitted visits back is the caller's job.

pub mod aggregator;
pub mod ip_extractor;
pub mod models;

pub use aggregator::VisitAggregator;
pub use ip_extractor::extract_client_ip;
pub use models::{DistinctVisitor, VisitEvent};

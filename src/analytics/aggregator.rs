//! Unique-visitor aggregation and duplicate-visit suppression
//!
//! Two suppression policies live here and they are intentionally not
//! unified:
//!
//! - [`VisitAggregator::suppress_duplicate_visits`] cleans an already
//!   fetched batch, comparing each event against everything retained so
//!   far.
//! - [`VisitAggregator::should_record`] is the online admission check run
//!   before inserting a new visit row; it looks at the single most recent
//!   prior visit only.
//!
//! Both use the same window, but a batch cleaned by one can differ from
//! what the other would have admitted. Callers pick the policy that
//! matches their side of the read/write split.

use std::collections::HashSet;

use crate::analytics::models::{DistinctVisitor, VisitEvent};

/// Default recency window: repeat visits by the same identity within this
/// many seconds count as one visit.
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Stateless aggregation over visit-event snapshots.
///
/// Holds only the suppression window; every operation is a pure function of
/// its inputs, making the aggregator freely shareable across handlers.
#[derive(Debug, Clone, Copy)]
pub struct VisitAggregator {
    window_secs: i64,
}

impl VisitAggregator {
    pub fn new(window_secs: i64) -> Self {
        Self { window_secs }
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Count the distinct visitor identities observed for one article.
    ///
    /// Events for other articles and events with an empty key are ignored.
    /// The result does not depend on the order of `events`.
    pub fn count_unique_visitors(&self, events: &[VisitEvent], item_id: i64) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        for event in events {
            if event.item_id == item_id && event.is_valid() {
                seen.insert(event.visitor_key.as_str());
            }
        }
        seen.len()
    }

    /// List each distinct visitor of one article, labelled by the first
    /// event observed for that identity. Later events carrying a different
    /// `display_name` for the same key are ignored without complaint.
    pub fn list_distinct_visitors(
        &self,
        events: &[VisitEvent],
        item_id: i64,
    ) -> Vec<DistinctVisitor> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut visitors = Vec::new();
        for event in events {
            if event.item_id != item_id || !event.is_valid() {
                continue;
            }
            if seen.insert(event.visitor_key.as_str()) {
                visitors.push(DistinctVisitor {
                    visitor_key: event.visitor_key.clone(),
                    display_name: event.display_name.clone(),
                });
            }
        }
        visitors
    }

    /// Drop events that repeat an already retained `(item, visitor)` pair
    /// within the window.
    ///
    /// The decision is streaming and left-to-right: each event is compared
    /// against the events retained before it, never against dropped ones.
    /// A run of closely spaced visits therefore collapses onto its first
    /// event, and anything at least a full window away from every retained
    /// event survives. Input order is preserved; malformed events are
    /// dropped.
    pub fn suppress_duplicate_visits(&self, events: &[VisitEvent]) -> Vec<VisitEvent> {
        let mut retained: Vec<VisitEvent> = Vec::new();
        for event in events {
            if !event.is_valid() {
                continue;
            }
            let duplicate = retained.iter().any(|kept| {
                kept.item_id == event.item_id
                    && kept.visitor_key == event.visitor_key
                    && (event.occurred_at - kept.occurred_at).abs() < self.window_secs
            });
            if !duplicate {
                retained.push(event.clone());
            }
        }
        retained
    }

    /// Write-admission check for a new visit.
    ///
    /// `prior_events` must be the visits already stored for the candidate's
    /// `(item, visitor)` pair, most recent first. Only the most recent one
    /// is inspected: if it is younger than the window relative to `now`,
    /// the candidate is suppressed. A malformed candidate is never
    /// admitted.
    ///
    /// There is no atomicity between this check and the subsequent insert;
    /// two racing writers can both be admitted. Exactly-once recording
    /// needs a uniqueness constraint in the store.
    pub fn should_record(
        &self,
        prior_events: &[VisitEvent],
        candidate: &VisitEvent,
        now: i64,
    ) -> bool {
        if !candidate.is_valid() {
            return false;
        }
        let latest = prior_events
            .iter()
            .find(|event| {
                event.item_id == candidate.item_id && event.visitor_key == candidate.visitor_key
            })
            .map(|event| event.occurred_at);
        match latest {
            Some(occurred_at) => now - occurred_at >= self.window_secs,
            None => true,
        }
    }
}

impl Default for VisitAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(item_id: i64, key: &str, occurred_at: i64) -> VisitEvent {
        VisitEvent {
            item_id,
            visitor_key: key.to_string(),
            occurred_at,
            display_name: None,
        }
    }

    fn named(item_id: i64, key: &str, occurred_at: i64, name: &str) -> VisitEvent {
        VisitEvent {
            display_name: Some(name.to_string()),
            ..event(item_id, key, occurred_at)
        }
    }

    #[test]
    fn count_bounded_by_matching_events() {
        let agg = VisitAggregator::default();
        let events = vec![
            event(1, "10.0.0.1", 0),
            event(1, "10.0.0.2", 5),
            event(1, "10.0.0.1", 10),
            event(2, "10.0.0.3", 15),
        ];
        assert_eq!(agg.count_unique_visitors(&events, 1), 2);
        assert_eq!(agg.count_unique_visitors(&events, 2), 1);
        assert_eq!(agg.count_unique_visitors(&events, 3), 0);
    }

    #[test]
    fn count_equals_events_when_all_keys_distinct() {
        let agg = VisitAggregator::default();
        let events: Vec<VisitEvent> = (0..7)
            .map(|i| event(1, &format!("10.0.0.{i}"), i))
            .collect();
        assert_eq!(agg.count_unique_visitors(&events, 1), events.len());
    }

    #[test]
    fn count_is_order_invariant() {
        let agg = VisitAggregator::default();
        let mut events = vec![
            event(1, "a", 3),
            event(1, "b", 1),
            event(1, "a", 2),
            event(1, "c", 9),
        ];
        let forward = agg.count_unique_visitors(&events, 1);
        events.reverse();
        assert_eq!(agg.count_unique_visitors(&events, 1), forward);
    }

    #[test]
    fn suppress_keeps_first_of_each_cluster() {
        // t=0 kept, t=30 inside the window of t=0, t=90 is 90s past the
        // last retained event and survives.
        let agg = VisitAggregator::new(60);
        let events = vec![event(1, "A", 0), event(1, "A", 30), event(1, "A", 90)];
        let retained = agg.suppress_duplicate_visits(&events);
        let times: Vec<i64> = retained.iter().map(|e| e.occurred_at).collect();
        assert_eq!(times, vec![0, 90]);
    }

    #[test]
    fn suppress_is_idempotent() {
        let agg = VisitAggregator::new(60);
        let events = vec![
            event(1, "A", 0),
            event(1, "A", 30),
            event(1, "B", 40),
            event(1, "A", 90),
            event(2, "A", 95),
        ];
        let once = agg.suppress_duplicate_visits(&events);
        let twice = agg.suppress_duplicate_visits(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn suppress_treats_items_independently() {
        let agg = VisitAggregator::new(60);
        let events = vec![event(1, "A", 0), event(2, "A", 10)];
        assert_eq!(agg.suppress_duplicate_visits(&events).len(), 2);
    }

    #[test]
    fn suppress_preserves_input_order() {
        let agg = VisitAggregator::new(60);
        let events = vec![event(1, "B", 50), event(1, "A", 10), event(2, "C", 20)];
        let retained = agg.suppress_duplicate_visits(&events);
        assert_eq!(retained, events);
    }

    #[test]
    fn should_record_inspects_only_latest_prior() {
        let agg = VisitAggregator::new(60);
        let now = 1_000;
        let candidate = event(1, "A", now);

        let recent = vec![event(1, "A", now - 30)];
        assert!(!agg.should_record(&recent, &candidate, now));

        let stale = vec![event(1, "A", now - 90)];
        assert!(agg.should_record(&stale, &candidate, now));

        // Older rows past the head are not consulted.
        let mixed = vec![event(1, "A", now - 90), event(1, "A", now - 10)];
        assert!(agg.should_record(&mixed, &candidate, now));
    }

    #[test]
    fn should_record_admits_first_visit() {
        let agg = VisitAggregator::new(60);
        assert!(agg.should_record(&[], &event(1, "A", 100), 100));
    }

    #[test]
    fn should_record_skips_other_identities() {
        let agg = VisitAggregator::new(60);
        let now = 500;
        let prior = vec![event(1, "B", now - 5), event(2, "A", now - 5)];
        assert!(agg.should_record(&prior, &event(1, "A", now), now));
    }

    #[test]
    fn first_display_name_wins() {
        let agg = VisitAggregator::default();
        let events = vec![
            named(1, "A", 0, "Alice"),
            named(1, "A", 10, "AliceTypo"),
            named(1, "B", 20, "Bob"),
        ];
        let visitors = agg.list_distinct_visitors(&events, 1);
        assert_eq!(visitors.len(), 2);
        assert_eq!(visitors[0].visitor_key, "A");
        assert_eq!(visitors[0].display_name.as_deref(), Some("Alice"));
        assert_eq!(visitors[1].visitor_key, "B");
        assert_eq!(visitors[1].display_name.as_deref(), Some("Bob"));
    }

    #[test]
    fn empty_input_yields_empty_results() {
        let agg = VisitAggregator::default();
        assert_eq!(agg.count_unique_visitors(&[], 1), 0);
        assert!(agg.list_distinct_visitors(&[], 1).is_empty());
        assert!(agg.suppress_duplicate_visits(&[]).is_empty());
    }

    #[test]
    fn malformed_events_are_excluded_silently() {
        let agg = VisitAggregator::new(60);
        let events = vec![event(1, "", 0), event(1, "A", 10)];
        assert_eq!(agg.count_unique_visitors(&events, 1), 1);
        assert_eq!(agg.suppress_duplicate_visits(&events).len(), 1);
        assert_eq!(agg.list_distinct_visitors(&events, 1).len(), 1);
        assert!(!agg.should_record(&[], &event(1, "", 100), 100));
    }
}

//! Monotonic counter deduplication
//!
//! Hardware step counters report a monotonically increasing total and some
//! sensors emit the same reading more than once. This converts the raw stream
//! into discrete deltas, dropping exact duplicates.

use chrono::{DateTime, FixedOffset};

/// A discrete counter reading accepted from the raw stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDelta {
    pub count: i64,
    pub timestamp: DateTime<FixedOffset>,
}

/// Stateful duplicate filter over a monotonic counter stream
#[derive(Debug, Default)]
pub struct CounterDeduplicator {
    last_observed: Option<i64>,
}

impl CounterDeduplicator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_observed: None,
        }
    }

    /// Resume from a persisted last-seen value
    #[must_use]
    pub const fn resume_from(last_observed: Option<i64>) -> Self {
        Self { last_observed }
    }

    /// Offer a new raw reading.
    ///
    /// Emits a delta when the value differs from the last observed reading
    /// (or nothing has been seen yet); returns `None` for exact duplicates.
    pub fn offer(
        &mut self,
        value: i64,
        at: DateTime<FixedOffset>,
    ) -> Option<CounterDelta> {
        if self.last_observed == Some(value) {
            return None;
        }
        self.last_observed = Some(value);
        Some(CounterDelta {
            count: value,
            timestamp: at,
        })
    }

    /// The most recently accepted reading, if any
    #[must_use]
    pub const fn last_observed(&self) -> Option<i64> {
        self.last_observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at() -> DateTime<FixedOffset> {
        "2024-05-01T08:00:00+00:00".parse().unwrap()
    }

    fn emitted(values: &[i64]) -> Vec<i64> {
        let mut dedup = CounterDeduplicator::new();
        values
            .iter()
            .filter_map(|v| dedup.offer(*v, at()))
            .map(|delta| delta.count)
            .collect()
    }

    #[test]
    fn consecutive_duplicate_yields_one_record() {
        assert_eq!(emitted(&[1234, 1234]), vec![1234]);
    }

    #[test]
    fn mixed_stream_drops_only_duplicates() {
        assert_eq!(
            emitted(&[1234, 1434, 1634, 1834, 1834, 1934]),
            vec![1234, 1434, 1634, 1834, 1934]
        );
    }

    #[test]
    fn distinct_values_all_emit() {
        assert_eq!(emitted(&[1234, 1334]), vec![1234, 1334]);
    }

    #[test]
    fn resume_from_suppresses_known_value() {
        let mut dedup = CounterDeduplicator::resume_from(Some(500));
        assert_eq!(dedup.offer(500, at()), None);
        assert!(dedup.offer(501, at()).is_some());
    }
}

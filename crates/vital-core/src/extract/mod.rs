//! Incremental extraction from the platform health-data provider
//!
//! The provider is the sole source of truth for "what changed"; this module
//! only does the watermark bookkeeping. Cursors advance strictly after the
//! extracted records have been durably queued, so a crash between extraction
//! and persistence causes re-extraction rather than data loss.

mod dedup;
mod mappers;
mod sensor;

pub use dedup::{CounterDelta, CounterDeduplicator};
pub use mappers::{Mapper, MapperRegistry};
pub use sensor::StepCounterSession;

use chrono::{DateTime, FixedOffset, Utc};

use crate::db::{CursorStore, OutboxStore};
use crate::error::Result;
use crate::models::{Cursor, RecordingMethod, SourceKind, Watermark};

/// A raw observation as yielded by the platform provider, before mapping
#[derive(Debug, Clone)]
pub struct ProviderObservation {
    /// Provider-issued stable identifier
    pub id: String,
    pub kind: SourceKind,
    pub value: f64,
    pub source: String,
    pub source_device: Option<String>,
    pub device_manufacturer: Option<String>,
    pub device_model: Option<String>,
    pub start_date_time: DateTime<FixedOffset>,
    pub end_date_time: DateTime<FixedOffset>,
    pub modified_date_time: DateTime<FixedOffset>,
    pub recording_method: RecordingMethod,
    /// Nested aggregates: sleep stages, heart-rate samples, exercise laps
    pub children: Vec<ProviderChild>,
}

/// A nested aggregate belonging to a parent observation
#[derive(Debug, Clone)]
pub struct ProviderChild {
    pub data_type: String,
    pub value: f64,
    pub start_date_time: DateTime<FixedOffset>,
    pub end_date_time: DateTime<FixedOffset>,
}

/// One provider reply: the changed observations plus the watermark to save
/// once they are durably queued
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    pub observations: Vec<ProviderObservation>,
    pub next_watermark: Watermark,
}

/// Capability boundary to the platform health-data provider.
///
/// `changed_records` returning `None` signals that the change token has
/// expired and the caller must fall back to a bounded window query.
pub trait HealthDataProvider {
    /// Source kinds the user has granted read access for
    fn granted_kinds(&self) -> Result<Vec<SourceKind>>;

    /// Delta query from a previously issued change token
    fn changed_records(&self, kind: SourceKind, token: &str) -> Result<Option<ChangeFeed>>;

    /// Bounded query over the current window (e.g. current day only);
    /// used on first run and after token expiry to avoid unbounded backfill
    fn current_window_records(&self, kind: SourceKind) -> Result<ChangeFeed>;

    /// Time-range query for providers that issue timestamp watermarks
    fn records_since(&self, kind: SourceKind, since: DateTime<Utc>) -> Result<ChangeFeed>;
}

/// Counts reported by one extraction pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Records durably queued this pass
    pub queued: usize,
    /// Kinds whose extraction failed and will be retried next pass
    pub failed_kinds: Vec<SourceKind>,
}

/// Cursor-driven extraction over every granted source kind
pub struct SourceExtractor<'a, P> {
    provider: &'a P,
    mappers: &'a MapperRegistry,
}

impl<'a, P: HealthDataProvider> SourceExtractor<'a, P> {
    pub const fn new(provider: &'a P, mappers: &'a MapperRegistry) -> Self {
        Self { provider, mappers }
    }

    /// Run one incremental pass: delta-query each granted kind, map, queue,
    /// then advance the kind's cursor.
    ///
    /// Provider failures are isolated per kind (logged and reported in the
    /// summary); storage failures abort the pass.
    pub fn run_pass(
        &self,
        outbox: &dyn OutboxStore,
        cursors: &dyn CursorStore,
    ) -> Result<ExtractionSummary> {
        let mut summary = ExtractionSummary::default();

        for kind in self.provider.granted_kinds()? {
            let cursor = cursors.get(kind)?;
            match self.fetch_feed(kind, cursor) {
                Ok(feed) => {
                    let queued = self.queue_feed(kind, &feed, outbox, cursors)?;
                    summary.queued += queued;
                }
                Err(error) => {
                    tracing::warn!("Extraction failed for {kind}: {error}");
                    summary.failed_kinds.push(kind);
                }
            }
        }

        Ok(summary)
    }

    /// Query the provider for one kind's changes, picking the query shape
    /// from the saved cursor. Touches no storage, so callers holding a
    /// database lock can release it across this call.
    pub fn fetch_feed(&self, kind: SourceKind, cursor: Option<Cursor>) -> Result<ChangeFeed> {
        match cursor.map(|c| c.watermark) {
            Some(Watermark::ChangeToken(token)) => {
                match self.provider.changed_records(kind, &token)? {
                    Some(feed) => Ok(feed),
                    None => {
                        tracing::warn!(
                            "Change token expired for {kind}, falling back to window query"
                        );
                        self.provider.current_window_records(kind)
                    }
                }
            }
            Some(Watermark::Timestamp(since)) => self.provider.records_since(kind, since),
            None => self.provider.current_window_records(kind),
        }
    }

    /// Queue mapped records, then advance the cursor. Order matters: the
    /// watermark must never move ahead of durably stored records.
    pub fn queue_feed(
        &self,
        kind: SourceKind,
        feed: &ChangeFeed,
        outbox: &dyn OutboxStore,
        cursors: &dyn CursorStore,
    ) -> Result<usize> {
        let mut records = Vec::new();
        for observation in &feed.observations {
            records.extend(self.mappers.map(observation)?);
        }

        outbox.upsert(&records)?;
        cursors.save(kind, &feed.next_watermark)?;

        if !records.is_empty() {
            tracing::debug!("Queued {} record(s) for {kind}", records.len());
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteCursorStore, SqliteOutboxStore};
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn observation(kind: SourceKind, id: &str) -> ProviderObservation {
        ProviderObservation {
            id: id.to_string(),
            kind,
            value: 100.0,
            source: "com.example.fit".to_string(),
            source_device: None,
            device_manufacturer: None,
            device_model: None,
            start_date_time: "2024-05-01T08:00:00+00:00".parse().unwrap(),
            end_date_time: "2024-05-01T08:30:00+00:00".parse().unwrap(),
            modified_date_time: "2024-05-01T08:30:00+00:00".parse().unwrap(),
            recording_method: RecordingMethod::Automatic,
            children: Vec::new(),
        }
    }

    /// Scripted provider covering the three query paths
    struct FakeProvider {
        kinds: Vec<SourceKind>,
        delta_reply: Option<ChangeFeed>,
        calls: RefCell<Vec<&'static str>>,
        fail_kind: Option<SourceKind>,
    }

    impl FakeProvider {
        fn new(kinds: Vec<SourceKind>) -> Self {
            Self {
                kinds,
                delta_reply: None,
                calls: RefCell::new(Vec::new()),
                fail_kind: None,
            }
        }

        fn feed(kind: SourceKind, ids: &[&str], watermark: Watermark) -> ChangeFeed {
            ChangeFeed {
                observations: ids.iter().map(|id| observation(kind, id)).collect(),
                next_watermark: watermark,
            }
        }
    }

    impl HealthDataProvider for FakeProvider {
        fn granted_kinds(&self) -> Result<Vec<SourceKind>> {
            Ok(self.kinds.clone())
        }

        fn changed_records(
            &self,
            kind: SourceKind,
            _token: &str,
        ) -> Result<Option<ChangeFeed>> {
            self.calls.borrow_mut().push("delta");
            if self.fail_kind == Some(kind) {
                return Err(Error::Provider("provider unavailable".to_string()));
            }
            Ok(self.delta_reply.clone())
        }

        fn current_window_records(&self, kind: SourceKind) -> Result<ChangeFeed> {
            self.calls.borrow_mut().push("window");
            if self.fail_kind == Some(kind) {
                return Err(Error::Provider("provider unavailable".to_string()));
            }
            Ok(Self::feed(
                kind,
                &["w1"],
                Watermark::ChangeToken("fresh".to_string()),
            ))
        }

        fn records_since(&self, kind: SourceKind, _since: DateTime<Utc>) -> Result<ChangeFeed> {
            self.calls.borrow_mut().push("since");
            Ok(Self::feed(
                kind,
                &["s1"],
                Watermark::Timestamp(Utc::now()),
            ))
        }
    }

    #[test]
    fn first_run_uses_bounded_window_query_and_creates_cursor() {
        let db = Database::open_in_memory().unwrap();
        let outbox = SqliteOutboxStore::new(db.connection());
        let cursors = SqliteCursorStore::new(db.connection());
        let provider = FakeProvider::new(vec![SourceKind::Steps]);
        let mappers = MapperRegistry::with_defaults();

        let summary = SourceExtractor::new(&provider, &mappers)
            .run_pass(&outbox, &cursors)
            .unwrap();

        assert_eq!(summary.queued, 1);
        assert_eq!(provider.calls.borrow().as_slice(), ["window"]);
        let cursor = cursors.get(SourceKind::Steps).unwrap().unwrap();
        assert_eq!(
            cursor.watermark,
            Watermark::ChangeToken("fresh".to_string())
        );
    }

    #[test]
    fn token_cursor_runs_delta_query() {
        let db = Database::open_in_memory().unwrap();
        let outbox = SqliteOutboxStore::new(db.connection());
        let cursors = SqliteCursorStore::new(db.connection());
        cursors
            .save(SourceKind::Steps, &Watermark::ChangeToken("t0".to_string()))
            .unwrap();

        let mut provider = FakeProvider::new(vec![SourceKind::Steps]);
        provider.delta_reply = Some(FakeProvider::feed(
            SourceKind::Steps,
            &["d1", "d2"],
            Watermark::ChangeToken("t1".to_string()),
        ));
        let mappers = MapperRegistry::with_defaults();

        let summary = SourceExtractor::new(&provider, &mappers)
            .run_pass(&outbox, &cursors)
            .unwrap();

        assert_eq!(summary.queued, 2);
        assert_eq!(provider.calls.borrow().as_slice(), ["delta"]);
        assert_eq!(
            cursors.get(SourceKind::Steps).unwrap().unwrap().watermark,
            Watermark::ChangeToken("t1".to_string())
        );
        assert_eq!(outbox.count().unwrap(), 2);
    }

    #[test]
    fn expired_token_falls_back_to_window_query() {
        let db = Database::open_in_memory().unwrap();
        let outbox = SqliteOutboxStore::new(db.connection());
        let cursors = SqliteCursorStore::new(db.connection());
        cursors
            .save(
                SourceKind::Steps,
                &Watermark::ChangeToken("stale".to_string()),
            )
            .unwrap();

        let provider = FakeProvider::new(vec![SourceKind::Steps]);
        let mappers = MapperRegistry::with_defaults();

        SourceExtractor::new(&provider, &mappers)
            .run_pass(&outbox, &cursors)
            .unwrap();

        assert_eq!(provider.calls.borrow().as_slice(), ["delta", "window"]);
        assert_eq!(
            cursors.get(SourceKind::Steps).unwrap().unwrap().watermark,
            Watermark::ChangeToken("fresh".to_string())
        );
    }

    #[test]
    fn timestamp_cursor_runs_since_query() {
        let db = Database::open_in_memory().unwrap();
        let outbox = SqliteOutboxStore::new(db.connection());
        let cursors = SqliteCursorStore::new(db.connection());
        cursors
            .save(
                SourceKind::DeviceUsage,
                &Watermark::Timestamp("2024-05-01T00:00:00Z".parse().unwrap()),
            )
            .unwrap();

        let provider = FakeProvider::new(vec![SourceKind::DeviceUsage]);
        let mappers = MapperRegistry::with_defaults();

        SourceExtractor::new(&provider, &mappers)
            .run_pass(&outbox, &cursors)
            .unwrap();

        assert_eq!(provider.calls.borrow().as_slice(), ["since"]);
        assert_eq!(outbox.count().unwrap(), 1);
    }

    #[test]
    fn provider_failure_is_isolated_and_cursor_untouched() {
        let db = Database::open_in_memory().unwrap();
        let outbox = SqliteOutboxStore::new(db.connection());
        let cursors = SqliteCursorStore::new(db.connection());

        let mut provider =
            FakeProvider::new(vec![SourceKind::Steps, SourceKind::Sleep]);
        provider.fail_kind = Some(SourceKind::Steps);
        let mappers = MapperRegistry::with_defaults();

        let summary = SourceExtractor::new(&provider, &mappers)
            .run_pass(&outbox, &cursors)
            .unwrap();

        assert_eq!(summary.failed_kinds, vec![SourceKind::Steps]);
        assert_eq!(cursors.get(SourceKind::Steps).unwrap(), None);
        // The healthy kind still queued
        assert_eq!(summary.queued, 1);
        assert!(cursors.get(SourceKind::Sleep).unwrap().is_some());
    }
}

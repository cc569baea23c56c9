//! Device step-counter ingestion
//!
//! The on-device counter reports a cumulative total since boot and may emit
//! the same total repeatedly. Readings pass through the deduplicator and come
//! out as instantaneous records ready for the outbox. Cumulative counter
//! records keep their own data type so interval overlap resolution never
//! touches them.

use chrono::{DateTime, FixedOffset};

use crate::models::{taxonomy, DataLogRecord, RecordId, RecordingMethod};

use super::dedup::CounterDeduplicator;

/// Converts raw cumulative counter readings into queueable records
pub struct StepCounterSession {
    dedup: CounterDeduplicator,
    source: String,
    source_device: Option<String>,
}

impl StepCounterSession {
    #[must_use]
    pub fn new(source: impl Into<String>, source_device: Option<String>) -> Self {
        Self {
            dedup: CounterDeduplicator::new(),
            source: source.into(),
            source_device,
        }
    }

    /// Continue a session across process restarts from a persisted total
    #[must_use]
    pub fn resume(
        source: impl Into<String>,
        source_device: Option<String>,
        last_observed: Option<i64>,
    ) -> Self {
        Self {
            dedup: CounterDeduplicator::resume_from(last_observed),
            source: source.into(),
            source_device,
        }
    }

    /// Offer a raw reading; exact duplicates produce no record
    pub fn observe(
        &mut self,
        cumulative: i64,
        at: DateTime<FixedOffset>,
    ) -> Option<DataLogRecord> {
        let delta = self.dedup.offer(cumulative, at)?;

        let id = RecordId::derived(
            &RecordId::new(self.source.clone()),
            &[
                taxonomy::data_types::STEP_COUNTER,
                &delta.count.to_string(),
                &at.to_rfc3339(),
            ],
        );

        #[allow(clippy::cast_precision_loss)]
        let value = delta.count as f64;

        Some(DataLogRecord {
            id,
            log_type: taxonomy::log_types::ACTIVITY.to_string(),
            data_type: taxonomy::data_types::STEP_COUNTER.to_string(),
            value,
            unit: taxonomy::units::COUNT.to_string(),
            source: self.source.clone(),
            source_device: self.source_device.clone(),
            device_manufacturer: None,
            device_model: None,
            start_date_time: at,
            end_date_time: at,
            modified_date_time: at,
            recording_method: RecordingMethod::Automatic,
            parent_id: None,
            post_attempts: Vec::new(),
        })
    }

    /// Total to persist so the next session can resume deduplication
    #[must_use]
    pub const fn last_observed(&self) -> Option<i64> {
        self.dedup.last_observed()
    }
}

//! Data log record model

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Taxonomy constants for log/data types and units.
///
/// Kept as plain string constants so new observation kinds can be introduced
/// by mappers without touching the record model.
pub mod taxonomy {
    /// Log type categories
    pub mod log_types {
        pub const ACTIVITY: &str = "activity";
        pub const SLEEP: &str = "sleep";
        pub const HEART: &str = "heart";
        pub const DEVICE: &str = "device";
        pub const EXERCISE: &str = "exercise";
    }

    /// Data type identifiers
    pub mod data_types {
        pub const STEPS: &str = "steps";
        pub const STEP_COUNTER: &str = "step_counter";
        pub const SLEEP_SESSION: &str = "sleep_session";
        pub const SLEEP_STAGE: &str = "sleep_stage";
        pub const HEART_RATE: &str = "heart_rate";
        pub const EXERCISE_SESSION: &str = "exercise_session";
        pub const EXERCISE_LAP: &str = "exercise_lap";
        pub const DEVICE_LOCK: &str = "device_lock";
    }

    /// Measurement units
    pub mod units {
        pub const COUNT: &str = "count";
        pub const MINUTE: &str = "minute";
        pub const BEAT_PER_MIN: &str = "beat_per_min";
        pub const METRE: &str = "metre";
    }
}

/// A stable identifier for a data log record.
///
/// Provider-issued ids pass through unchanged; ids for child records are
/// derived deterministically so re-extraction of the same source event yields
/// the same id (the idempotent upsert key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a provider-issued identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a child record id from its parent id plus discriminating fields.
    ///
    /// Uses UUIDv5 over the concatenated inputs, so the same source event
    /// always maps to the same id.
    #[must_use]
    pub fn derived(parent: &Self, parts: &[&str]) -> Self {
        let mut name = parent.0.clone();
        for part in parts {
            name.push(':');
            name.push_str(part);
        }
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Provenance quality of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMethod {
    Automatic,
    ManualEntry,
    #[default]
    Unknown,
}

impl RecordingMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::ManualEntry => "manual_entry",
            Self::Unknown => "unknown",
        }
    }
}

/// The canonical unit of synchronization.
///
/// Records are immutable once uploaded; reconciliation appends new delta
/// records rather than mutating already-synchronized ones. The only mutation
/// the engine performs is appending upload-attempt timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLogRecord {
    pub id: RecordId,
    pub log_type: String,
    pub data_type: String,
    pub value: f64,
    pub unit: String,
    /// Originating package/app identifier
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    pub start_date_time: DateTime<FixedOffset>,
    pub end_date_time: DateTime<FixedOffset>,
    /// Provider's last-write time; basis for change comparison
    pub modified_date_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub recording_method: RecordingMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RecordId>,
    /// Upload attempt timestamps, append-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_attempts: Vec<DateTime<FixedOffset>>,
}

impl DataLogRecord {
    /// Record an upload attempt against this record
    pub fn mark_post_attempt(&mut self, at: DateTime<FixedOffset>) {
        self.post_attempts.push(at);
    }
}

//! Extraction cursor model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitored source record types.
///
/// One cursor is tracked per kind; outbox entries of different kinds are
/// disjoint by data type, so kinds synchronize independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Steps,
    Sleep,
    HeartRate,
    Exercise,
    DeviceUsage,
}

impl SourceKind {
    /// All kinds the engine knows how to monitor
    pub const ALL: [Self; 5] = [
        Self::Steps,
        Self::Sleep,
        Self::HeartRate,
        Self::Exercise,
        Self::DeviceUsage,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::Sleep => "sleep",
            Self::HeartRate => "heart_rate",
            Self::Exercise => "exercise",
            Self::DeviceUsage => "device_usage",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steps" => Ok(Self::Steps),
            "sleep" => Ok(Self::Sleep),
            "heart_rate" => Ok(Self::HeartRate),
            "exercise" => Ok(Self::Exercise),
            "device_usage" => Ok(Self::DeviceUsage),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown source kind: {other}"
            ))),
        }
    }
}

/// How far incremental extraction has progressed for a source kind.
///
/// Providers that issue change tokens store the opaque token; providers that
/// only support time-range queries store the last successful query timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Watermark {
    ChangeToken(String),
    Timestamp(DateTime<Utc>),
}

/// A saved extraction position for one source kind.
///
/// Created lazily on first successful extraction, advanced only after the
/// extracted records are durably queued, and removed only by explicit reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub source: SourceKind,
    pub watermark: Watermark,
}

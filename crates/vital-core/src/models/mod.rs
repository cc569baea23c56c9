//! Data models for vital-core

mod cursor;
mod record;

pub use cursor::{Cursor, SourceKind, Watermark};
pub use record::{taxonomy, DataLogRecord, RecordId, RecordingMethod};

//! Adaptive chunk sizing
//!
//! Chunk sizes are derived from a random sample of the pending batch rather
//! than a fixed count, so payloads stay near the byte budget whether the
//! batch holds slim step records or annotation-heavy exercise sessions.

use rand::seq::SliceRandom;

use crate::models::DataLogRecord;

/// Byte budget for a single upload payload
pub const CHUNK_BYTE_LIMIT: usize = 32 * 1024;

/// Historical average serialized record size, used when nothing can be sampled
const AVG_RECORD_SIZE_BYTES: usize = 210;

/// Conservative per-record estimate for the degenerate fallback
const FALLBACK_RECORD_SIZE_BYTES: usize = 292;

/// Records per chunk for the given budget, sized from a sampled record.
///
/// One random record is serialized to estimate per-record cost; an empty
/// batch or unserializable sample falls back to the historical average.
/// Can return 0 when a single record exceeds the budget; callers must
/// substitute [`fallback_limit`] before chunking.
#[must_use]
pub fn calculate_limit(pending: &[DataLogRecord], byte_budget: usize) -> usize {
    let sampled_size = pending
        .choose(&mut rand::thread_rng())
        .and_then(|record| serde_json::to_vec(record).ok())
        .map_or(AVG_RECORD_SIZE_BYTES, |bytes| bytes.len());

    byte_budget / sampled_size.max(1)
}

/// Guaranteed-positive chunk size for when the sampled estimate collapses
#[must_use]
pub const fn fallback_limit(byte_budget: usize) -> usize {
    (byte_budget + FALLBACK_RECORD_SIZE_BYTES) / FALLBACK_RECORD_SIZE_BYTES
}

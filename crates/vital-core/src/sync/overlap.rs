//! Interval overlap resolution
//!
//! Concurrent extraction paths (device sensor and platform provider) can both
//! report step intervals for the same span. Overlaps are collapsed per
//! originating source; cross-source intervals are intentionally preserved.

use std::collections::HashMap;

use crate::models::{taxonomy, DataLogRecord};

/// Resolve same-source interval overlaps in a flat batch of records.
///
/// Interval-bearing records (step intervals) are sorted by
/// `(start, end)` and walked against the last accepted interval:
/// non-overlapping candidates append, overlapping candidates with
/// `end >= accepted end` replace the accepted entry, anything else is
/// discarded as contained. All other record kinds pass through untouched.
pub fn resolve_overlaps(records: Vec<DataLogRecord>) -> Vec<DataLogRecord> {
    let mut by_source: HashMap<String, Vec<DataLogRecord>> = HashMap::new();
    for record in records {
        by_source
            .entry(record.source.clone())
            .or_default()
            .push(record);
    }

    let mut resolved = Vec::new();
    for (_, group) in by_source {
        resolved.extend(resolve_source_group(group));
    }
    resolved
}

fn resolve_source_group(mut group: Vec<DataLogRecord>) -> Vec<DataLogRecord> {
    group.sort_by(|a, b| {
        (a.start_date_time, a.end_date_time).cmp(&(b.start_date_time, b.end_date_time))
    });

    let mut accepted: Vec<DataLogRecord> = Vec::new();
    let mut pass_through = Vec::new();

    for current in group {
        if current.data_type != taxonomy::data_types::STEPS {
            pass_through.push(current);
            continue;
        }

        let Some(last) = accepted.last() else {
            accepted.push(current);
            continue;
        };

        // Second-resolution comparison, matching provider timestamp precision
        let last_end = last.end_date_time.timestamp();
        let current_start = current.start_date_time.timestamp();
        let current_end = current.end_date_time.timestamp();

        let non_overlapping = last_end <= current_start && last_end < current_end;
        let longer_interval = !non_overlapping && current_end >= last_end;

        if non_overlapping {
            accepted.push(current);
        } else if longer_interval {
            if let Some(slot) = accepted.last_mut() {
                *slot = current;
            }
        }
        // Otherwise: strictly contained in the accepted interval, discard
    }

    accepted.extend(pass_through);
    accepted
}

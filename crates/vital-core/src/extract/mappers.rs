//! Per-kind observation mappers
//!
//! Raw provider observations are converted to `DataLogRecord`s by mapping
//! functions registered per source kind. Adding a new observation kind means
//! registering a mapper here; the extraction pass and upload pipeline stay
//! untouched.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{taxonomy, DataLogRecord, RecordId, SourceKind};
use crate::util::normalize_text_option;

use super::{ProviderChild, ProviderObservation};

/// Mapping function from one raw observation to canonical records
pub type Mapper = fn(&ProviderObservation) -> Vec<DataLogRecord>;

/// Lookup table of mappers keyed by source kind
pub struct MapperRegistry {
    mappers: HashMap<SourceKind, Mapper>,
}

impl MapperRegistry {
    /// Registry with the built-in mappers for every known kind
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            mappers: HashMap::new(),
        };
        registry.register(SourceKind::Steps, map_steps);
        registry.register(SourceKind::Sleep, map_sleep);
        registry.register(SourceKind::HeartRate, map_heart_rate);
        registry.register(SourceKind::Exercise, map_exercise);
        registry.register(SourceKind::DeviceUsage, map_device_usage);
        registry
    }

    /// Register or replace the mapper for a kind
    pub fn register(&mut self, kind: SourceKind, mapper: Mapper) {
        self.mappers.insert(kind, mapper);
    }

    /// Map one observation through the registered mapper for its kind
    pub fn map(&self, observation: &ProviderObservation) -> Result<Vec<DataLogRecord>> {
        let mapper = self.mappers.get(&observation.kind).ok_or_else(|| {
            Error::Provider(format!(
                "No mapper registered for source kind: {}",
                observation.kind
            ))
        })?;
        Ok(mapper(observation))
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn base_record(
    observation: &ProviderObservation,
    log_type: &str,
    data_type: &str,
    unit: &str,
) -> DataLogRecord {
    DataLogRecord {
        id: RecordId::new(observation.id.clone()),
        log_type: log_type.to_string(),
        data_type: data_type.to_string(),
        value: observation.value,
        unit: unit.to_string(),
        source: observation.source.clone(),
        source_device: normalize_text_option(observation.source_device.clone()),
        device_manufacturer: normalize_text_option(observation.device_manufacturer.clone()),
        device_model: normalize_text_option(observation.device_model.clone()),
        start_date_time: observation.start_date_time,
        end_date_time: observation.end_date_time,
        modified_date_time: observation.modified_date_time,
        recording_method: observation.recording_method,
        parent_id: None,
        post_attempts: Vec::new(),
    }
}

fn child_record(
    parent: &DataLogRecord,
    child: &ProviderChild,
    index: usize,
    log_type: &str,
    unit: &str,
) -> DataLogRecord {
    let mut record = parent.clone();
    record.id = RecordId::derived(
        &parent.id,
        &[
            &child.data_type,
            &index.to_string(),
            &child.start_date_time.to_rfc3339(),
        ],
    );
    record.log_type = log_type.to_string();
    record.data_type = child.data_type.clone();
    record.value = child.value;
    record.unit = unit.to_string();
    record.start_date_time = child.start_date_time;
    record.end_date_time = child.end_date_time;
    record.parent_id = Some(parent.id.clone());
    record
}

fn map_steps(observation: &ProviderObservation) -> Vec<DataLogRecord> {
    vec![base_record(
        observation,
        taxonomy::log_types::ACTIVITY,
        taxonomy::data_types::STEPS,
        taxonomy::units::COUNT,
    )]
}

/// Sleep sessions expand into the session record plus one child per stage
fn map_sleep(observation: &ProviderObservation) -> Vec<DataLogRecord> {
    let session = base_record(
        observation,
        taxonomy::log_types::SLEEP,
        taxonomy::data_types::SLEEP_SESSION,
        taxonomy::units::MINUTE,
    );

    let mut records = vec![session.clone()];
    for (index, stage) in observation.children.iter().enumerate() {
        records.push(child_record(
            &session,
            stage,
            index,
            taxonomy::log_types::SLEEP,
            taxonomy::units::MINUTE,
        ));
    }
    records
}

/// Heart rate series flatten to one record per sample
fn map_heart_rate(observation: &ProviderObservation) -> Vec<DataLogRecord> {
    let series = base_record(
        observation,
        taxonomy::log_types::HEART,
        taxonomy::data_types::HEART_RATE,
        taxonomy::units::BEAT_PER_MIN,
    );

    if observation.children.is_empty() {
        return vec![series];
    }

    observation
        .children
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let mut record = child_record(
                &series,
                sample,
                index,
                taxonomy::log_types::HEART,
                taxonomy::units::BEAT_PER_MIN,
            );
            // Samples stand alone on the wire; the series is not uploaded
            record.parent_id = None;
            record
        })
        .collect()
}

/// Exercise sessions expand into the session record plus one child per lap
fn map_exercise(observation: &ProviderObservation) -> Vec<DataLogRecord> {
    let session = base_record(
        observation,
        taxonomy::log_types::EXERCISE,
        taxonomy::data_types::EXERCISE_SESSION,
        taxonomy::units::MINUTE,
    );

    let mut records = vec![session.clone()];
    for (index, lap) in observation.children.iter().enumerate() {
        records.push(child_record(
            &session,
            lap,
            index,
            taxonomy::log_types::EXERCISE,
            taxonomy::units::METRE,
        ));
    }
    records
}

fn map_device_usage(observation: &ProviderObservation) -> Vec<DataLogRecord> {
    vec![base_record(
        observation,
        taxonomy::log_types::DEVICE,
        taxonomy::data_types::DEVICE_LOCK,
        taxonomy::units::MINUTE,
    )]
}

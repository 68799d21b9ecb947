//! Row-to-entity mappers and column parse helpers.

use chrono::{DateTime, Utc};
use hearth_types::{SensorReading, SignalEvent, TriggerEvent};
use rusqlite::Row;
use uuid::Uuid;

/// Parses an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(idx: usize, text: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parses a UUID column.
pub(crate) fn parse_uuid(idx: usize, text: &str) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parses a label column through the type's `FromStr`.
fn parse_label<T>(idx: usize, text: &str) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn map_row_to_signal_event(row: &Row) -> rusqlite::Result<SignalEvent> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(8)?;
    let device_kind: String = row.get(11)?;
    let event_category: String = row.get(12)?;

    Ok(SignalEvent {
        id: parse_uuid(0, &id)?,
        source: row.get(1)?,
        device_id: row.get(2)?,
        location: row.get(3)?,
        capability: row.get(4)?,
        event_type: row.get(5)?,
        event_sub_type: row.get(6)?,
        value: row.get(7)?,
        timestamp_utc: parse_timestamp(8, &timestamp)?,
        raw_topic: row.get(9)?,
        raw_payload: row.get(10)?,
        device_kind: parse_label(11, &device_kind)?,
        event_category: parse_label(12, &event_category)?,
    })
}

pub(crate) fn map_row_to_reading(row: &Row) -> rusqlite::Result<SensorReading> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(5)?;

    Ok(SensorReading {
        id: parse_uuid(0, &id)?,
        device_id: row.get(1)?,
        metric: row.get(2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        timestamp_utc: parse_timestamp(5, &timestamp)?,
    })
}

pub(crate) fn map_row_to_trigger(row: &Row) -> rusqlite::Result<TriggerEvent> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(3)?;
    let source_id: Option<String> = row.get(4)?;

    Ok(TriggerEvent {
        id: parse_uuid(0, &id)?,
        device_id: row.get(1)?,
        trigger_type: row.get(2)?,
        timestamp_utc: parse_timestamp(3, &timestamp)?,
        source_signal_event_id: source_id.as_deref().map(|s| parse_uuid(4, s)).transpose()?,
    })
}

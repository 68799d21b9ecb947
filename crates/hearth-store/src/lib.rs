//! Persistence repositories for signal events, readings, and trigger events.
//!
//! All repository operations are free functions over a borrowed
//! [`rusqlite::Connection`]; callers own pooling and threading (the server
//! runs these on `spawn_blocking`). Batch inserts run inside a transaction
//! so a message's derived records land atomically.

mod row;

use hearth_types::{SensorReading, SignalEvent, TriggerEvent};
use rusqlite::{params, Connection};
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Inserts one signal event.
pub fn insert_signal_event(conn: &Connection, event: &SignalEvent) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO signal_events (
            id, source, device_id, location, capability, event_type,
            event_sub_type, value, timestamp_utc, raw_topic, raw_payload,
            device_kind, event_category
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            event.id.to_string(),
            event.source,
            event.device_id,
            event.location,
            event.capability,
            event.event_type,
            event.event_sub_type,
            event.value,
            event.timestamp_utc.to_rfc3339(),
            event.raw_topic,
            event.raw_payload,
            event.device_kind.label(),
            event.event_category.label(),
        ],
    )?;
    Ok(())
}

/// Inserts a batch of sensor readings in a single transaction.
pub fn insert_readings(conn: &Connection, readings: &[SensorReading]) -> Result<(), StoreError> {
    if readings.is_empty() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO sensor_readings (id, device_id, metric, value, unit, timestamp_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for reading in readings {
            stmt.execute(params![
                reading.id.to_string(),
                reading.device_id,
                reading.metric,
                reading.value,
                reading.unit,
                reading.timestamp_utc.to_rfc3339(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Inserts a batch of trigger events in a single transaction.
pub fn insert_trigger_events(
    conn: &Connection,
    triggers: &[TriggerEvent],
) -> Result<(), StoreError> {
    if triggers.is_empty() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO trigger_events (id, device_id, trigger_type, timestamp_utc, source_signal_event_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for trigger in triggers {
            stmt.execute(params![
                trigger.id.to_string(),
                trigger.device_id,
                trigger.trigger_type,
                trigger.timestamp_utc.to_rfc3339(),
                trigger.source_signal_event_id.map(|id| id.to_string()),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Returns the most recent signal events, newest first.
pub fn recent_signal_events(conn: &Connection, take: u32) -> Result<Vec<SignalEvent>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, source, device_id, location, capability, event_type,
                event_sub_type, value, timestamp_utc, raw_topic, raw_payload,
                device_kind, event_category
         FROM signal_events
         ORDER BY timestamp_utc DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([take], row::map_row_to_signal_event)?;
    let mut events = Vec::new();
    for r in rows {
        events.push(r?);
    }
    Ok(events)
}

/// Returns the most recent readings, newest first.
pub fn recent_readings(conn: &Connection, take: u32) -> Result<Vec<SensorReading>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, device_id, metric, value, unit, timestamp_utc
         FROM sensor_readings
         ORDER BY timestamp_utc DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([take], row::map_row_to_reading)?;
    let mut readings = Vec::new();
    for r in rows {
        readings.push(r?);
    }
    Ok(readings)
}

/// Returns the most recent readings for one device + metric, newest first.
pub fn readings_by_device_and_metric(
    conn: &Connection,
    device_id: &str,
    metric: &str,
    take: u32,
) -> Result<Vec<SensorReading>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, device_id, metric, value, unit, timestamp_utc
         FROM sensor_readings
         WHERE device_id = ?1 AND metric = ?2
         ORDER BY timestamp_utc DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(
        params![device_id, metric, take],
        row::map_row_to_reading,
    )?;
    let mut readings = Vec::new();
    for r in rows {
        readings.push(r?);
    }
    Ok(readings)
}

/// Returns the most recent trigger events, newest first.
pub fn recent_trigger_events(
    conn: &Connection,
    take: u32,
) -> Result<Vec<TriggerEvent>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, device_id, trigger_type, timestamp_utc, source_signal_event_id
         FROM trigger_events
         ORDER BY timestamp_utc DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([take], row::map_row_to_trigger)?;
    let mut triggers = Vec::new();
    for r in rows {
        triggers.push(r?);
    }
    Ok(triggers)
}

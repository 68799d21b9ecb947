//! Rule CRUD and audit log persistence.

use crate::RuleError;
use chrono::{DateTime, Utc};
use hearth_types::{CustomTriggerLog, CustomTriggerRule, RuleOperator};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

/// Parameters for creating a new rule.
#[derive(Debug, Clone)]
pub struct CreateRuleParams {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub trigger_type: String,
    pub device_id: String,
    pub metric: String,
    pub operator: RuleOperator,
    pub threshold: f64,
    pub threshold2: Option<f64>,
    pub cooldown_seconds: Option<i64>,
}

/// Parameters for updating an existing rule.
///
/// Only fields that are `Some` are modified.
#[derive(Debug, Clone, Default)]
pub struct UpdateRuleParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub trigger_type: Option<String>,
    pub device_id: Option<String>,
    pub metric: Option<String>,
    pub operator: Option<RuleOperator>,
    pub threshold: Option<f64>,
    pub threshold2: Option<f64>,
    pub cooldown_seconds: Option<i64>,
}

/// Creates a new rule and returns the stored row.
pub fn create_rule(
    conn: &Connection,
    params: &CreateRuleParams,
) -> Result<CustomTriggerRule, RuleError> {
    let now = Utc::now();
    let rule = CustomTriggerRule {
        id: Uuid::new_v4(),
        name: params.name.clone(),
        description: params.description.clone(),
        enabled: params.enabled,
        trigger_type: params.trigger_type.clone(),
        device_id: params.device_id.clone(),
        metric: params.metric.clone(),
        operator: params.operator,
        threshold: params.threshold,
        threshold2: params.threshold2,
        cooldown_seconds: params.cooldown_seconds,
        last_fired_utc: None,
        created_utc: now,
        updated_utc: now,
    };

    conn.execute(
        "INSERT INTO custom_trigger_rules (
            id, name, description, enabled, trigger_type, device_id, metric,
            operator, threshold, threshold2, cooldown_seconds, last_fired_utc,
            created_utc, updated_utc
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            rule.id.to_string(),
            rule.name,
            rule.description,
            rule.enabled,
            rule.trigger_type,
            rule.device_id,
            rule.metric,
            rule.operator.label(),
            rule.threshold,
            rule.threshold2,
            rule.cooldown_seconds,
            Option::<String>::None,
            rule.created_utc.to_rfc3339(),
            rule.updated_utc.to_rfc3339(),
        ],
    )?;

    Ok(rule)
}

/// Retrieves a rule by id.
pub fn get_rule(conn: &Connection, rule_id: Uuid) -> Result<CustomTriggerRule, RuleError> {
    conn.query_row(
        "SELECT id, name, description, enabled, trigger_type, device_id, metric,
                operator, threshold, threshold2, cooldown_seconds, last_fired_utc,
                created_utc, updated_utc
         FROM custom_trigger_rules WHERE id = ?1",
        [rule_id.to_string()],
        map_row_to_rule,
    )
    .optional()?
    .ok_or(RuleError::NotFound(rule_id))
}

/// Lists all rules, oldest first.
pub fn list_rules(conn: &Connection) -> Result<Vec<CustomTriggerRule>, RuleError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, enabled, trigger_type, device_id, metric,
                operator, threshold, threshold2, cooldown_seconds, last_fired_utc,
                created_utc, updated_utc
         FROM custom_trigger_rules ORDER BY created_utc ASC",
    )?;

    let rows = stmt.query_map([], map_row_to_rule)?;
    let mut rules = Vec::new();
    for row in rows {
        rules.push(row?);
    }
    Ok(rules)
}

/// Lists all enabled rules, oldest first. This is the cache-refresh query.
pub fn list_enabled_rules(conn: &Connection) -> Result<Vec<CustomTriggerRule>, RuleError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, enabled, trigger_type, device_id, metric,
                operator, threshold, threshold2, cooldown_seconds, last_fired_utc,
                created_utc, updated_utc
         FROM custom_trigger_rules WHERE enabled = 1 ORDER BY created_utc ASC",
    )?;

    let rows = stmt.query_map([], map_row_to_rule)?;
    let mut rules = Vec::new();
    for row in rows {
        rules.push(row?);
    }
    Ok(rules)
}

/// Updates an existing rule using a single atomic UPDATE statement.
///
/// Only fields that are `Some` in `updates` are modified; `updated_utc` is
/// always stamped. This avoids the read-modify-write race that would occur
/// if we fetched the rule, mutated in memory, and wrote back.
pub fn update_rule(
    conn: &Connection,
    rule_id: Uuid,
    updates: &UpdateRuleParams,
) -> Result<CustomTriggerRule, RuleError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1usize;

    if let Some(name) = &updates.name {
        set_parts.push(format!("name = ?{}", idx));
        values.push(Box::new(name.clone()));
        idx += 1;
    }
    if let Some(description) = &updates.description {
        set_parts.push(format!("description = ?{}", idx));
        values.push(Box::new(description.clone()));
        idx += 1;
    }
    if let Some(enabled) = updates.enabled {
        set_parts.push(format!("enabled = ?{}", idx));
        values.push(Box::new(enabled));
        idx += 1;
    }
    if let Some(trigger_type) = &updates.trigger_type {
        set_parts.push(format!("trigger_type = ?{}", idx));
        values.push(Box::new(trigger_type.clone()));
        idx += 1;
    }
    if let Some(device_id) = &updates.device_id {
        set_parts.push(format!("device_id = ?{}", idx));
        values.push(Box::new(device_id.clone()));
        idx += 1;
    }
    if let Some(metric) = &updates.metric {
        set_parts.push(format!("metric = ?{}", idx));
        values.push(Box::new(metric.clone()));
        idx += 1;
    }
    if let Some(operator) = updates.operator {
        set_parts.push(format!("operator = ?{}", idx));
        values.push(Box::new(operator.label().to_string()));
        idx += 1;
    }
    if let Some(threshold) = updates.threshold {
        set_parts.push(format!("threshold = ?{}", idx));
        values.push(Box::new(threshold));
        idx += 1;
    }
    if let Some(threshold2) = updates.threshold2 {
        set_parts.push(format!("threshold2 = ?{}", idx));
        values.push(Box::new(threshold2));
        idx += 1;
    }
    if let Some(cooldown) = updates.cooldown_seconds {
        set_parts.push(format!("cooldown_seconds = ?{}", idx));
        values.push(Box::new(cooldown));
        idx += 1;
    }

    set_parts.push(format!("updated_utc = ?{}", idx));
    values.push(Box::new(Utc::now().to_rfc3339()));
    idx += 1;

    let sql = format!(
        "UPDATE custom_trigger_rules SET {} WHERE id = ?{}",
        set_parts.join(", "),
        idx
    );
    values.push(Box::new(rule_id.to_string()));

    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, params.as_slice())?;
    if count == 0 {
        return Err(RuleError::NotFound(rule_id));
    }

    get_rule(conn, rule_id)
}

/// Deletes a rule. Its audit logs cascade.
pub fn delete_rule(conn: &Connection, rule_id: Uuid) -> Result<(), RuleError> {
    let count = conn.execute(
        "DELETE FROM custom_trigger_rules WHERE id = ?1",
        [rule_id.to_string()],
    )?;
    if count == 0 {
        return Err(RuleError::NotFound(rule_id));
    }
    Ok(())
}

/// Stamps a rule's last-fired instant after the engine fired it.
pub fn set_last_fired(
    conn: &Connection,
    rule_id: Uuid,
    fired_utc: DateTime<Utc>,
) -> Result<(), RuleError> {
    let count = conn.execute(
        "UPDATE custom_trigger_rules SET last_fired_utc = ?1 WHERE id = ?2",
        params![fired_utc.to_rfc3339(), rule_id.to_string()],
    )?;
    if count == 0 {
        return Err(RuleError::NotFound(rule_id));
    }
    Ok(())
}

/// Appends one firing record to the audit log.
pub fn append_log(conn: &Connection, log: &CustomTriggerLog) -> Result<(), RuleError> {
    conn.execute(
        "INSERT INTO custom_trigger_logs (
            id, rule_id, fired_utc, device_id, metric, value, condition,
            generated_trigger_event_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            log.id.to_string(),
            log.rule_id.to_string(),
            log.fired_utc.to_rfc3339(),
            log.device_id,
            log.metric,
            log.value,
            log.condition,
            log.generated_trigger_event_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

/// Lists the audit log for one rule, newest first.
pub fn logs_for_rule(
    conn: &Connection,
    rule_id: Uuid,
    take: u32,
) -> Result<Vec<CustomTriggerLog>, RuleError> {
    let mut stmt = conn.prepare(
        "SELECT id, rule_id, fired_utc, device_id, metric, value, condition,
                generated_trigger_event_id
         FROM custom_trigger_logs
         WHERE rule_id = ?1
         ORDER BY fired_utc DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![rule_id.to_string(), take], map_row_to_log)?;
    let mut logs = Vec::new();
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

fn parse_timestamp(idx: usize, text: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_uuid(idx: usize, text: &str) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_row_to_rule(row: &Row) -> rusqlite::Result<CustomTriggerRule> {
    let id: String = row.get(0)?;
    let operator: String = row.get(7)?;
    let last_fired: Option<String> = row.get(11)?;
    let created: String = row.get(12)?;
    let updated: String = row.get(13)?;

    Ok(CustomTriggerRule {
        id: parse_uuid(0, &id)?,
        name: row.get(1)?,
        description: row.get(2)?,
        enabled: row.get(3)?,
        trigger_type: row.get(4)?,
        device_id: row.get(5)?,
        metric: row.get(6)?,
        operator: operator.parse::<RuleOperator>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        threshold: row.get(8)?,
        threshold2: row.get(9)?,
        cooldown_seconds: row.get(10)?,
        last_fired_utc: last_fired.as_deref().map(|s| parse_timestamp(11, s)).transpose()?,
        created_utc: parse_timestamp(12, &created)?,
        updated_utc: parse_timestamp(13, &updated)?,
    })
}

fn map_row_to_log(row: &Row) -> rusqlite::Result<CustomTriggerLog> {
    let id: String = row.get(0)?;
    let rule_id: String = row.get(1)?;
    let fired: String = row.get(2)?;
    let generated: Option<String> = row.get(7)?;

    Ok(CustomTriggerLog {
        id: parse_uuid(0, &id)?,
        rule_id: parse_uuid(1, &rule_id)?,
        fired_utc: parse_timestamp(2, &fired)?,
        device_id: row.get(3)?,
        metric: row.get(4)?,
        value: row.get(5)?,
        condition: row.get(6)?,
        generated_trigger_event_id: generated.as_deref().map(|s| parse_uuid(7, s)).transpose()?,
    })
}

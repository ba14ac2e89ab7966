use crate::model::Table;
use std::time::{SystemTime, UNIX_EPOCH};

/// MQTT topic carrying change events for one table.
pub fn change_topic(table: Table) -> String {
    format!("changes/{table}")
}

/// Current time in milliseconds.
pub fn now_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Current time in seconds.
pub fn now_timestamp_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

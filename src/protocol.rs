use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::types::{Level, Side};

pub const DEFAULT_BASE_URL: &str = "https://app-api.8slp.net";

pub fn device_status_path(device_id: &str) -> String {
    format!("v1/devices/{device_id}/status")
}

pub fn side_power_path(device_id: &str, side: Side) -> String {
    format!("v1/devices/{device_id}/sides/{}/power", side.as_api_str())
}

pub fn side_level_path(device_id: &str, side: Side) -> String {
    format!("v1/devices/{device_id}/sides/{}/level", side.as_api_str())
}

/// Ambient metrics for the hour before `now`.
pub fn ambient_metrics_path(device_id: &str, now: DateTime<Utc>) -> String {
    let from = (now - Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        "v1/devices/{device_id}/metrics/ambient?granularity=minute&from={from}&scope=humidity&scope=roomTemperature"
    )
}

pub fn power_data(on: bool) -> Value {
    json!({ "on": on })
}

pub fn level_data(level: Level) -> Value {
    json!({ "targetLevel": level.value() })
}

/// Latest room temperature sample, or 0 when the series is missing or empty.
pub fn latest_room_temperature(body: &Value) -> f64 {
    let timeseries = match body.pointer("/metrics/roomTemperature/timeseries") {
        Some(Value::Array(samples)) => samples,
        _ => return 0.0,
    };
    timeseries
        .last()
        .and_then(|sample| sample.get("value"))
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

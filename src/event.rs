use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::model::StageRef;

/// Only the first point's `x` is consulted. Nothing to resolve gives
/// `Ok(None)`; a payload of the wrong shape is an error.
pub fn resolve_click(payload: &Value) -> Result<Option<String>> {
    let object = match payload {
        Value::Null => return Ok(None),
        Value::Object(object) => object,
        other => bail!("click payload must be an object or null, got {}", kind(other)),
    };

    let points = match object.get("points") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(points)) => points,
        Some(other) => bail!("click payload 'points' must be an array, got {}", kind(other)),
    };

    let Some(first) = points.first() else {
        return Ok(None);
    };

    let point = match first {
        Value::Object(point) => point,
        other => bail!("click point must be an object, got {}", kind(other)),
    };

    match point.get("x") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(Value::Number(number)) => Ok(Some(number_category(number))),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => bail!("click point 'x' must be a scalar, got {}", kind(other)),
    }
}

// Integral floats print without the trailing ".0" so they match CSV cells.
fn number_category(number: &serde_json::Number) -> String {
    if let Some(value) = number.as_i64() {
        return value.to_string();
    }
    if let Some(value) = number.as_u64() {
        return value.to_string();
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => format!("{value:.0}"),
        _ => number.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedEvent {
    pub stage: StageRef,
    #[serde(default)]
    pub event: Value,
}

pub fn parse_event_log(raw: &str) -> Result<Vec<LoggedEvent>> {
    let mut events = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: LoggedEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

pub fn read_event_log(path: &Path) -> Result<Vec<LoggedEvent>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read event log {}", path.display()))?;
    parse_event_log(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

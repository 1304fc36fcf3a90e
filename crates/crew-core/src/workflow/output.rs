//! Coercion of raw agent/tool text into a step's declared output schema.
//!
//! The raw text may be bare JSON, JSON inside a fenced code block, or prose
//! surrounding a single JSON object. Values are coerced where the intent is
//! unambiguous (`"0.28"` → `0.28` for a float field, `3` → `3.0`); anything
//! else is a violation.

use serde_json::{Map, Number, Value};

use crate::models::{FieldType, OutputSchema};

/// Parse `raw` and validate it against `schema`.
///
/// On success returns an object holding exactly the schema's fields, in
/// schema order. On failure returns a human-readable reason.
pub fn coerce(raw: &str, schema: &OutputSchema) -> Result<Value, String> {
    let candidate = extract_json_object(raw)
        .ok_or_else(|| "no JSON object found in output".to_string())?;
    let parsed: Value =
        serde_json::from_str(candidate).map_err(|e| format!("invalid JSON: {}", e))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| "output is not a JSON object".to_string())?;

    let mut record = Map::new();
    for field in &schema.fields {
        let value = object
            .get(&field.name)
            .ok_or_else(|| format!("missing field '{}'", field.name))?;
        let coerced = coerce_value(value, field.kind).ok_or_else(|| {
            format!(
                "field '{}' expected {}, got {}",
                field.name,
                field.kind,
                describe(value)
            )
        })?;
        record.insert(field.name.clone(), coerced);
    }
    Ok(Value::Object(record))
}

fn coerce_value(value: &Value, kind: FieldType) -> Option<Value> {
    match (kind, value) {
        (FieldType::String, Value::String(_)) => Some(value.clone()),
        (FieldType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (FieldType::Float, Value::Number(n)) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (FieldType::Integer, Value::Number(n)) => n.as_i64().map(|i| Value::Number(i.into())),
        (FieldType::Integer, Value::String(s)) => {
            s.trim().parse::<i64>().ok().map(|i| Value::Number(i.into()))
        }
        (FieldType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (FieldType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(Value::Bool(true)),
            "false" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Locate the JSON object inside `raw`: a ```json fence first, otherwise the
/// span from the first `{` to the last `}`.
fn extract_json_object(raw: &str) -> Option<&str> {
    if let Some(start) = raw.find("```") {
        let after = &raw[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let fenced = body[..end].trim();
            if fenced.starts_with('{') {
                return Some(fenced);
            }
        }
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

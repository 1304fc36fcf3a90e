//! Deterministic backend for dry runs and tests. No network.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{CompletionBackend, CompletionRequest};
use crate::error::CompletionError;
use crate::models::{FieldType, OutputSchema};

/// Answers every prompt with a canned, reproducible response.
///
/// Schema-constrained requests get a JSON object with one placeholder value
/// per field, so structured steps still coerce cleanly.
#[derive(Debug, Default, Clone)]
pub struct OfflineBackend;

impl OfflineBackend {
    pub fn new() -> Self {
        Self
    }
}

fn placeholder_record(schema: &OutputSchema, agent: &str) -> Value {
    let mut record = Map::new();
    for field in &schema.fields {
        let value = match field.kind {
            FieldType::String => Value::String(format!("offline {} from {}", field.name, agent)),
            FieldType::Float => serde_json::json!(0.0),
            FieldType::Integer => serde_json::json!(0),
            FieldType::Boolean => Value::Bool(false),
        };
        record.insert(field.name.clone(), value);
    }
    Value::Object(record)
}

fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() > max_chars {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

#[async_trait]
impl CompletionBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        if let Some(schema) = &request.schema {
            return Ok(placeholder_record(schema, &request.agent).to_string());
        }
        Ok(format!(
            "[offline:{}] {} completed '{}'.",
            request.agent,
            request.step_id,
            first_line(&request.prompt, 120)
        ))
    }
}

//! Step descriptors: one unit of orchestrated work.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step id, used by `context` lists and `${steps.<id>.output}`.
    pub id: String,

    /// Id of the agent responsible for this step.
    pub agent: String,

    /// Task description handed to the agent.
    #[serde(default)]
    pub description: String,

    /// What a good result looks like. Only used to build the agent's input.
    #[serde(default)]
    pub expected_output: Option<String>,

    /// Predecessor step ids, in the order their results are concatenated.
    #[serde(default)]
    pub context: Vec<String>,

    /// Tool override. Falls back to the agent's tool when unset.
    #[serde(default)]
    pub tool: Option<String>,

    /// Tool argument templates.
    #[serde(default)]
    pub args: BTreeMap<String, String>,

    /// Structured-output constraint on the step's result.
    #[serde(default)]
    pub output_schema: Option<OutputSchema>,
}

impl Step {
    pub fn new(id: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent: agent.into(),
            description: String::new(),
            expected_output: None,
            context: Vec::new(),
            tool: None,
            args: BTreeMap::new(),
            output_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_context<I, S>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = context.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.args.insert(name.into(), template.into());
        self
    }

    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Named set of typed fields a step's result must conform to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            description: None,
        });
        self
    }

    /// Instruction appended to the agent prompt so the backend answers in shape.
    pub fn instructions(&self) -> String {
        let mut text = format!(
            "Respond with a single JSON object ({}) containing exactly these fields:\n",
            self.name
        );
        for field in &self.fields {
            match &field.description {
                Some(desc) => {
                    text.push_str(&format!("- {} ({}): {}\n", field.name, field.kind, desc))
                }
                None => text.push_str(&format!("- {} ({})\n", field.name, field.kind)),
            }
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Float,
    Integer,
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Float => "float",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_step_yaml() {
        let yaml = r#"
id: validate_model
agent: model_validator
description: "Cross-validate the tuned model."
context: [tune_model]
output_schema:
  name: FinalModelEvaluation
  fields:
    - name: model_name
      type: string
    - name: key_metric_score
      type: float
      description: "Final optimized metric"
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.id, "validate_model");
        assert_eq!(step.context, vec!["tune_model"]);
        let schema = step.output_schema.unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[1].kind, FieldType::Float);
    }

    #[test]
    fn test_schema_instructions_list_fields() {
        let schema = OutputSchema::new("Eval")
            .field("model_name", FieldType::String)
            .field("score", FieldType::Float);
        let text = schema.instructions();
        assert!(text.contains("Eval"));
        assert!(text.contains("- model_name (string)"));
        assert!(text.contains("- score (float)"));
    }
}

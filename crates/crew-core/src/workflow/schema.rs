//! YAML schema for crew workflow definitions.
//!
//! A definition declares the agents, the steps with their predecessors, and
//! how the run is driven:
//!
//! ```yaml
//! name: "Churn AutoML"
//! version: "1.0"
//!
//! variables:
//!   client_email: "${CLIENT_EMAIL:-client@example.com}"
//!
//! agents:
//!   - id: data_processor
//!     role: "Data Acquisition Specialist"
//!     tool: data_processor
//!   - id: client_communicator
//!     role: "Client Communicator"
//!     tool: send_email
//!
//! steps:
//!   - id: ingest
//!     agent: data_processor
//!     args:
//!       task: "download and analyze dataset"
//!   - id: notify
//!     agent: client_communicator
//!     context: [ingest]
//!     args:
//!       recipient: "${variables.client_email}"
//!       body: "${steps.ingest.output}"
//!
//! run:
//!   mode: sequential
//!   terminate_on:
//!     contains: "SUCCESS: Email"
//!
//! llm:
//!   provider: ollama
//!   model: mistral
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{resolve_env_vars, LlmConfig, RunConfig};
use crate::error::CrewError;
use crate::models::{Agent, AgentRegistry, Step};
use crate::tools::ToolInvoker;
use crate::workflow::template::referenced_steps;

/// Top-level workflow definition loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_version")]
    pub version: String,

    /// Values for `${variables.<key>}` (supports `${ENV_VAR}` references).
    #[serde(default)]
    pub variables: HashMap<String, String>,

    pub agents: Vec<Agent>,

    /// Steps in declaration order. Declaration order breaks ordering ties.
    pub steps: Vec<Step>,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl WorkflowDefinition {
    /// Parse a workflow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, CrewError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CrewError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CrewError::Definition(format!(
                "failed to read workflow file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, CrewError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Agent registry for one run. Duplicate ids keep the first declaration.
    pub fn registry(&self) -> AgentRegistry {
        self.agents.iter().cloned().collect()
    }

    /// Variables with `${ENV_VAR}` references expanded.
    pub fn resolved_variables(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), resolve_env_vars(v)))
            .collect()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Every structural problem in the definition, in declaration order.
    ///
    /// Graph shape (cycles, unknown predecessors) is checked separately by
    /// the resolver.
    pub fn problems(&self, tools: &ToolInvoker) -> Vec<String> {
        let mut problems = Vec::new();

        let mut agent_ids = HashSet::new();
        for agent in &self.agents {
            if !agent_ids.insert(agent.id.as_str()) {
                problems.push(format!("agent '{}' is declared more than once", agent.id));
            }
            if let Some(tool) = &agent.tool {
                if !tools.contains(tool) {
                    problems.push(format!(
                        "agent '{}' binds unregistered tool '{}'",
                        agent.id, tool
                    ));
                }
            }
        }

        for step in &self.steps {
            if !agent_ids.contains(step.agent.as_str()) {
                problems.push(format!(
                    "step '{}' is assigned to unknown agent '{}'",
                    step.id, step.agent
                ));
            }
            if let Some(tool) = &step.tool {
                if !tools.contains(tool) {
                    problems.push(format!(
                        "step '{}' binds unregistered tool '{}'",
                        step.id, tool
                    ));
                }
            }
            for template in step.args.values() {
                for referenced in referenced_steps(template) {
                    if !step.context.contains(&referenced) {
                        problems.push(format!(
                            "step '{}' references '${{steps.{}.output}}' but '{}' is not in its context",
                            step.id, referenced, referenced
                        ));
                    }
                }
            }
        }

        if self.run.max_round == 0 {
            problems.push("run.max_round must be at least 1".to_string());
        }

        problems
    }

    /// Fail on the first batch of structural problems.
    pub fn validate(&self, tools: &ToolInvoker) -> Result<(), CrewError> {
        let problems = self.problems(tools);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(CrewError::Definition(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunMode, ToolSettings};
    use crate::workflow::termination::TerminationRule;

    const MINIMAL: &str = r#"
name: "Minimal"
agents:
  - id: analyst
    role: "Analyst"
steps:
  - id: analyze
    agent: analyst
    description: "Analyze the data."
"#;

    #[test]
    fn test_parse_minimal_workflow() {
        let wf = WorkflowDefinition::from_yaml(MINIMAL).unwrap();
        assert_eq!(wf.name, "Minimal");
        assert_eq!(wf.version, "1.0");
        assert_eq!(wf.steps.len(), 1);
        assert_eq!(wf.run.mode, RunMode::Sequential);
        assert_eq!(wf.run.max_round, 50);
        assert!(wf.validate(&ToolInvoker::new()).is_ok());
    }

    #[test]
    fn test_parse_full_workflow() {
        let yaml = r#"
name: "Full"
variables:
  recipient: "${CREW_TEST_SCHEMA_RECIPIENT:-client@example.com}"
agents:
  - id: processor
    role: "Data Processor"
    tool: data_processor
  - id: communicator
    role: "Client Communicator"
    tool: send_email
steps:
  - id: ingest
    agent: processor
    args:
      task: "download and analyze dataset"
  - id: notify
    agent: communicator
    context: [ingest]
    args:
      recipient: "${variables.recipient}"
      body: "${steps.ingest.output}"
run:
  mode: conversation
  max_round: 10
  selector: round_robin
  terminate_on:
    contains: "SUCCESS: Email"
llm:
  provider: offline
"#;
        let wf = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(wf.run.mode, RunMode::Conversation);
        assert_eq!(wf.run.max_round, 10);
        assert_eq!(
            wf.run.terminate_on,
            Some(TerminationRule::Contains("SUCCESS: Email".into()))
        );
        assert_eq!(
            wf.resolved_variables()["recipient"],
            "client@example.com"
        );
        let tools = ToolInvoker::with_defaults(&ToolSettings::default());
        assert!(wf.validate(&tools).is_ok());
        assert_eq!(wf.registry().len(), 2);
    }

    #[test]
    fn test_validation_collects_problems() {
        let yaml = r#"
name: "Broken"
agents:
  - id: a
    role: "A"
    tool: teleport
  - id: a
    role: "A again"
steps:
  - id: s1
    agent: ghost
  - id: s2
    agent: a
    tool: missing_tool
    args:
      text: "${steps.s1.output}"
run:
  max_round: 0
"#;
        let wf = WorkflowDefinition::from_yaml(yaml).unwrap();
        let problems = wf.problems(&ToolInvoker::new());
        assert_eq!(problems.len(), 6, "{:?}", problems);
        assert!(problems[0].contains("unregistered tool 'teleport'"));
        assert!(problems[1].contains("declared more than once"));
        assert!(problems[2].contains("unknown agent 'ghost'"));
        assert!(problems[3].contains("unregistered tool 'missing_tool'"));
        assert!(problems[4].contains("not in its context"));
        assert!(problems[5].contains("max_round"));
        assert!(matches!(
            wf.validate(&ToolInvoker::new()),
            Err(CrewError::Definition(_))
        ));
    }

    #[test]
    fn test_from_file_and_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wf.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        let wf = WorkflowDefinition::from_file(&path).unwrap();
        let again = WorkflowDefinition::from_yaml(&wf.to_yaml().unwrap()).unwrap();
        assert_eq!(again.steps, wf.steps);

        assert!(matches!(
            WorkflowDefinition::from_file(tmp.path().join("nope.yaml")),
            Err(CrewError::Definition(_))
        ));
    }
}

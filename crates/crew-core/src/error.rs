//! Error taxonomy for the crew engine.
//!
//! Errors fall into three families that map onto the phases of a run:
//!
//! - [`GraphError`]: raised while building the step graph, before anything runs.
//! - [`StepError`]: a single step could not produce a usable result; the run
//!   halts at that step but keeps every result recorded so far.
//! - [`SelectionError`]: conversation mode could not pick the next speaker,
//!   or ran out of rounds.
//!
//! [`CrewError`] wraps everything that can be returned as an `Err` from the
//! public API (definition loading, graph resolution, I/O). Step and selection
//! errors normally surface through [`RunOutcome`](crate::models::RunOutcome)
//! instead, so the partial run can still be inspected.

use serde::Serialize;

/// Failure to derive an execution order from a set of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphError {
    #[error("Cycle detected between steps: {}", steps.join(" → "))]
    CycleDetected { steps: Vec<String> },

    #[error("Step '{step}' depends on unknown step '{predecessor}'")]
    UnknownPredecessor { step: String, predecessor: String },

    #[error("Step '{step}' is declared more than once")]
    DuplicateStep { step: String },

    #[error("Workflow declares no steps")]
    EmptyWorkflow,
}

/// Fatal failure of one step. The run halts at the failing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("Step '{step}': tool '{tool}' is unavailable: {reason}")]
    ToolUnavailable {
        step: String,
        tool: String,
        reason: String,
    },

    #[error("Step '{step}': tool '{tool}' failed: {reason}")]
    ToolFailed {
        step: String,
        tool: String,
        reason: String,
    },

    #[error("Step '{step}': output does not match schema '{schema}': {reason}")]
    SchemaViolation {
        step: String,
        schema: String,
        reason: String,
    },

    #[error("Step '{step}': completion backend failed: {reason}")]
    CompletionFailed { step: String, reason: String },

    #[error("Step '{step}' is assigned to unknown agent '{agent}'")]
    UnknownAgent { step: String, agent: String },

    #[error("Step '{step}' binds unregistered tool '{tool}'")]
    UnknownTool { step: String, tool: String },
}

impl StepError {
    /// Id of the step that failed.
    pub fn step(&self) -> &str {
        match self {
            StepError::ToolUnavailable { step, .. }
            | StepError::ToolFailed { step, .. }
            | StepError::SchemaViolation { step, .. }
            | StepError::CompletionFailed { step, .. }
            | StepError::UnknownAgent { step, .. }
            | StepError::UnknownTool { step, .. } => step,
        }
    }
}

/// Conversation-mode speaker selection failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionError {
    #[error("No eligible speaker; pending steps are blocked: {}", pending.join(", "))]
    NoEligibleSpeaker { pending: Vec<String> },

    #[error("Selection policy chose step '{step}' whose predecessors have not spoken")]
    IneligibleSpeaker { step: String },

    #[error("Round limit of {max_round} reached without a termination match")]
    RoundLimitExceeded { max_round: usize },
}

/// Errors raised by a tool at the collaborator boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// A required external resource (credentials, spool directory, network)
    /// is not configured.
    #[error("{0}")]
    Unavailable(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors raised by a text-completion backend.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Malformed(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

/// Top-level error for the crew engine.
#[derive(Debug, thiserror::Error)]
pub enum CrewError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Invalid workflow definition: {0}")]
    Definition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Completion backend error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Duplicate result for step '{0}'")]
    DuplicateResult(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

pub type Result<T, E = CrewError> = std::result::Result<T, E>;

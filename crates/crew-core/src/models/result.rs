//! Step results, the per-run results store, the conversation transcript and
//! the final run report.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RunMode;
use crate::error::{CrewError, SelectionError, StepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Outcome of one executed step. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step_id: String,
    pub agent: String,
    /// Raw text produced by the agent or tool.
    pub output: String,
    /// Schema-conforming record, when the step declares an output schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Position in the run, starting at 1.
    pub ordinal: usize,
    pub completed_at: DateTime<Utc>,
}

impl StepResult {
    pub fn succeeded(step_id: &str, agent: &str, output: String) -> Self {
        Self {
            step_id: step_id.to_string(),
            agent: agent.to_string(),
            output,
            structured: None,
            status: StepStatus::Succeeded,
            error: None,
            ordinal: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(step_id: &str, agent: &str, output: String, error: &StepError) -> Self {
        Self {
            step_id: step_id.to_string(),
            agent: agent.to_string(),
            output,
            structured: None,
            status: StepStatus::Failed,
            error: Some(error.to_string()),
            ordinal: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn with_structured(mut self, record: serde_json::Value) -> Self {
        self.structured = Some(record);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// Text forwarded to dependent steps: the structured record rendered as
    /// JSON when present, the raw output otherwise.
    pub fn text(&self) -> String {
        match &self.structured {
            Some(record) => {
                serde_json::to_string_pretty(record).unwrap_or_else(|_| record.to_string())
            }
            None => self.output.clone(),
        }
    }
}

/// Results of one workflow run, keyed by step id, in completion order.
///
/// This is the only channel through which later steps observe earlier ones.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResultsStore {
    results: Vec<StepResult>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result, stamping its ordinal. Each step may be recorded once.
    pub fn record(&mut self, mut result: StepResult) -> Result<&StepResult, CrewError> {
        if self.index.contains_key(&result.step_id) {
            return Err(CrewError::DuplicateResult(result.step_id));
        }
        result.ordinal = self.results.len() + 1;
        self.index.insert(result.step_id.clone(), self.results.len());
        self.results.push(result);
        Ok(&self.results[self.results.len() - 1])
    }

    pub fn get(&self, step_id: &str) -> Option<&StepResult> {
        self.index.get(step_id).map(|&i| &self.results[i])
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.index.contains_key(step_id)
    }

    /// Results in completion order.
    pub fn all(&self) -> &[StepResult] {
        &self.results
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.step_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn last(&self) -> Option<&StepResult> {
        self.results.last()
    }
}

/// One utterance in a conversation-mode run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    /// Agent id of the speaker (or the initiator for the opening message).
    pub speaker: String,
    /// Step the speaker answered, `None` for the opening message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub content: String,
}

/// Ordered (speaker, message) pairs shared by all agents in conversation mode.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn last_speaker(&self) -> Option<&str> {
        self.entries.last().map(|e| e.speaker.as_str())
    }

    /// Whether a step already has a transcript entry.
    pub fn has_spoken(&self, step_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.step_id.as_deref() == Some(step_id))
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step ran.
    Completed,
    /// The termination predicate matched this step's result.
    Terminated { step_id: String },
    /// Conversation mode hit its round bound. Soft stop.
    RoundLimitExceeded { max_round: usize },
    /// A step failed; later steps never ran.
    StepFailed { step_id: String, error: StepError },
    /// Conversation mode could not pick a valid speaker.
    SelectionFailed { error: SelectionError },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed | RunOutcome::Terminated { .. })
    }

    /// Fatal outcomes halt the run with an error state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunOutcome::StepFailed { .. } | RunOutcome::SelectionFailed { .. }
        )
    }

    pub fn failed_step(&self) -> Option<&str> {
        match self {
            RunOutcome::StepFailed { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Terminated { step_id } => {
                write!(f, "terminated early after '{}'", step_id)
            }
            RunOutcome::RoundLimitExceeded { max_round } => {
                write!(f, "round limit reached ({} rounds)", max_round)
            }
            RunOutcome::StepFailed { step_id, error } => {
                write!(f, "halted at '{}': {}", step_id, error)
            }
            RunOutcome::SelectionFailed { error } => write!(f, "selection failed: {}", error),
        }
    }
}

/// Everything a finished run leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub workflow: String,
    pub mode: RunMode,
    /// Resolved execution order (sequential) or speaking order (conversation).
    pub order: Vec<String>,
    pub results: ResultsStore,
    #[serde(skip_serializing_if = "Transcript::is_empty")]
    pub transcript: Transcript,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.outcome.failed_step()
    }

    /// Result text of a step, if it ran.
    pub fn output(&self, step_id: &str) -> Option<String> {
        self.results.get(step_id).map(StepResult::text)
    }
}

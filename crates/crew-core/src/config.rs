//! Run configuration.
//!
//! Three sources feed a run, in increasing priority:
//!
//! 1. the `run:` and `llm:` blocks of the workflow YAML,
//! 2. the process environment (optionally seeded from `.env.local` / `.env`),
//! 3. CLI overrides applied by the caller.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CrewError;
use crate::workflow::termination::TerminationRule;

/// Control strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Walk the resolved dependency order.
    #[default]
    Sequential,
    /// Turn-by-turn speaker selection over a shared transcript.
    Conversation,
}

impl FromStr for RunMode {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Ok(RunMode::Sequential),
            "conversation" | "chat" | "group_chat" => Ok(RunMode::Conversation),
            other => Err(CrewError::Config(format!("unknown run mode '{}'", other))),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Sequential => write!(f, "sequential"),
            RunMode::Conversation => write!(f, "conversation"),
        }
    }
}

/// Speaker-selection policy for conversation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    #[default]
    DeclarationOrder,
    RoundRobin,
    Manager,
}

impl FromStr for SelectorKind {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "declaration_order" | "declaration" => Ok(SelectorKind::DeclarationOrder),
            "round_robin" => Ok(SelectorKind::RoundRobin),
            "manager" | "auto" => Ok(SelectorKind::Manager),
            other => Err(CrewError::Config(format!("unknown selector '{}'", other))),
        }
    }
}

/// The `run:` block of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub mode: RunMode,

    /// Early-stop rule matched against step results / transcript entries.
    #[serde(default)]
    pub terminate_on: Option<TerminationRule>,

    /// Transcript bound for conversation mode.
    #[serde(default = "default_max_round")]
    pub max_round: usize,

    /// Opening message of a conversation-mode run.
    #[serde(default)]
    pub initial_message: Option<String>,

    /// Agent id credited with the opening message.
    #[serde(default = "default_initiator")]
    pub initiator: String,

    #[serde(default)]
    pub selector: SelectorKind,
}

fn default_max_round() -> usize {
    50
}

fn default_initiator() -> String {
    "initiator".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            terminate_on: None,
            max_round: default_max_round(),
            initial_message: None,
            initiator: default_initiator(),
            selector: SelectorKind::default(),
        }
    }
}

/// Which text-completion service answers agent prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// OpenAI-compatible endpoint served by a local Ollama.
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    /// Deterministic canned answers, no network.
    Offline,
}

/// The `llm:` block of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Supports `${ENV_VAR}` references.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "${OLLAMA_BASE_URL:-http://localhost:11434}".to_string()
}

fn default_model() -> String {
    "mistral".to_string()
}

fn default_timeout() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl LlmConfig {
    /// Copy with every `${VAR}` reference expanded from the environment.
    pub fn resolved(&self) -> Self {
        Self {
            base_url: resolve_env_vars(&self.base_url),
            model: resolve_env_vars(&self.model),
            api_key: self.api_key.as_deref().map(resolve_env_vars),
            ..self.clone()
        }
    }
}

/// Environment-driven settings of the built-in collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Directory of `*.eml` files scanned by the inbox check.
    pub inbox_spool_dir: Option<PathBuf>,
    /// Overrides the recipient of every outgoing email.
    pub client_email: Option<String>,
    pub email_log: PathBuf,
    /// Root of the client knowledge base read by `read_knowledge`.
    pub knowledge_dir: Option<PathBuf>,
    /// Root under which committed reports are written.
    pub report_root: PathBuf,
    pub repo_owner: String,
    pub repo_name: String,
    /// Fixes the data processor's random choices.
    pub data_seed: Option<u64>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            inbox_spool_dir: None,
            client_email: None,
            email_log: PathBuf::from("automation_logs/email_log.txt"),
            knowledge_dir: None,
            report_root: PathBuf::from("."),
            repo_owner: "MOCK_OWNER".to_string(),
            repo_name: "MOCK_REPO".to_string(),
            data_seed: None,
        }
    }
}

impl ToolSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            inbox_spool_dir: non_empty_env("INBOX_SPOOL_DIR").map(PathBuf::from),
            client_email: non_empty_env("CLIENT_EMAIL"),
            email_log: non_empty_env("CREW_EMAIL_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.email_log),
            knowledge_dir: non_empty_env("CREW_KNOWLEDGE_DIR").map(PathBuf::from),
            report_root: non_empty_env("CREW_REPORT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_root),
            repo_owner: non_empty_env("GITHUB_REPO_OWNER").unwrap_or(defaults.repo_owner),
            repo_name: non_empty_env("GITHUB_REPO_NAME").unwrap_or(defaults.repo_name),
            data_seed: non_empty_env("CREW_DATA_SEED").and_then(|s| s.parse().ok()),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Load `.env.local` then `.env` from the working directory.
///
/// Variables already present in the environment are never overwritten.
/// Returns the files that were loaded.
pub fn load_env_files() -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    for filename in [".env.local", ".env"] {
        match dotenvy::from_filename(filename) {
            Ok(path) => {
                tracing::info!(file = %path.display(), "Loaded environment file");
                loaded.push(path);
            }
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(file = filename, error = %e, "Failed to load environment file"),
        }
    }
    loaded
}

/// Load one explicitly named env file. Existing variables still win.
pub fn load_env_file(path: impl AsRef<std::path::Path>) -> Result<(), CrewError> {
    let path = path.as_ref();
    dotenvy::from_path(path).map_err(|e| {
        CrewError::Config(format!("failed to load env file '{}': {}", path.display(), e))
    })?;
    tracing::info!(file = %path.display(), "Loaded environment file");
    Ok(())
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax; unknown variables
/// without a default are left untouched.
pub fn resolve_env_vars(input: &str) -> String {
    let re = env_var_regex();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        if let Some(idx) = var_expr.find(":-") {
            let var_name = &var_expr[..idx];
            let default_val = &var_expr[idx + 2..];
            std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
        } else {
            std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
        }
    })
    .to_string()
}

fn env_var_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

//! Tool registry and the collaborator trait.
//!
//! A tool is an external, side-effecting function invoked on an agent's
//! behalf. The orchestrators treat tool output as opaque text: they never
//! inspect or branch on it, apart from the termination predicate.

pub mod data_processor;
pub mod email;
pub mod inbox;
pub mod knowledge;
pub mod report_commit;

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ToolSettings;
use crate::error::ToolError;

pub use data_processor::DataProcessorTool;
pub use email::SendEmailTool;
pub use inbox::CheckInboxTool;
pub use knowledge::ReadKnowledgeTool;
pub use report_commit::CommitReportTool;

/// What a tool touches outside the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEffect {
    None,
    Filesystem,
    Network,
}

impl SideEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffect::None => "none",
            SideEffect::Filesystem => "filesystem",
            SideEffect::Network => "network",
        }
    }
}

/// Rendered string arguments for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolArgs(BTreeMap<String, String>);

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Argument value, rejecting a missing or blank one.
    pub fn require(&self, name: &str) -> Result<&str, ToolError> {
        self.get(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArgs(format!("missing argument '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Join `relative` onto `root`, rejecting absolute paths and any path that
/// would climb out of `root`. `what` names the root in error messages.
pub(crate) fn confined_path(
    root: &Path,
    relative: &str,
    what: &str,
) -> Result<PathBuf, ToolError> {
    let path = Path::new(relative);
    if path.is_absolute() {
        return Err(ToolError::InvalidArgs(format!(
            "{} path '{}' must be relative",
            what, relative
        )));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(ToolError::InvalidArgs(format!(
            "{} path '{}' may not leave the {} root",
            what, relative, what
        )));
    }
    Ok(root.join(path))
}

impl FromIterator<(String, String)> for ToolArgs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry id, referenced from agent and step definitions.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn side_effect(&self) -> SideEffect;

    /// Argument filled from the step's effective input when a step omits it.
    fn primary_arg(&self) -> &str;

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError>;
}

type ToolFn = dyn Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync;

/// A tool backed by a closure. Handy for embedding the engine and for tests.
pub struct FnTool {
    name: String,
    description: String,
    primary_arg: String,
    side_effect: SideEffect,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, primary_arg: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            description: format!("Custom tool '{}'", name),
            name,
            primary_arg: primary_arg.into(),
            side_effect: SideEffect::None,
            func: Box::new(func),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_side_effect(mut self, side_effect: SideEffect) -> Self {
        self.side_effect = side_effect;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn side_effect(&self) -> SideEffect {
        self.side_effect
    }

    fn primary_arg(&self) -> &str {
        &self.primary_arg
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        (self.func)(args)
    }
}

/// Lookup table from tool id to implementation.
#[derive(Clone, Default)]
pub struct ToolInvoker {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in collaborators.
    pub fn with_defaults(settings: &ToolSettings) -> Self {
        let mut invoker = Self::new();
        invoker.register(CheckInboxTool::new(settings.inbox_spool_dir.clone()));
        invoker.register(match settings.data_seed {
            Some(seed) => DataProcessorTool::with_seed(seed),
            None => DataProcessorTool::new(),
        });
        invoker.register(ReadKnowledgeTool::new(settings.knowledge_dir.clone()));
        invoker.register(CommitReportTool::new(
            settings.report_root.clone(),
            settings.repo_owner.clone(),
            settings.repo_name.clone(),
        ));
        invoker.register(SendEmailTool::new(
            settings.email_log.clone(),
            settings.client_email.clone(),
        ));
        invoker
    }

    /// Register a tool. A later registration under the same id replaces the
    /// earlier one.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        match self.index.get(tool.name()) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(tool.name().to_string(), self.tools.len());
                self.tools.push(tool);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered tools in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::Unavailable(format!("tool '{}' is not registered", name)))?;
        tool.invoke(args).await
    }
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_invoke_fn_tool() {
        let mut invoker = ToolInvoker::new();
        invoker.register(FnTool::new("echo", "text", |args| {
            Ok(args.require("text")?.to_string())
        }));

        let out = invoker
            .invoke("echo", &ToolArgs::new().with("text", "X"))
            .await
            .unwrap();
        assert_eq!(out, "X");

        let err = invoker.invoke("echo", &ToolArgs::new()).await.unwrap_err();
        assert_eq!(err, ToolError::InvalidArgs("missing argument 'text'".into()));
    }

    #[tokio::test]
    async fn test_unregistered_tool_is_unavailable() {
        let invoker = ToolInvoker::new();
        assert!(matches!(
            invoker.invoke("nope", &ToolArgs::new()).await,
            Err(ToolError::Unavailable(_))
        ));
    }

    #[test]
    fn test_defaults_and_replacement() {
        let mut invoker = ToolInvoker::with_defaults(&ToolSettings::default());
        assert_eq!(
            invoker.names(),
            vec![
                "check_inbox",
                "data_processor",
                "read_knowledge",
                "commit_report",
                "send_email"
            ]
        );
        invoker.register(
            FnTool::new("send_email", "body", |_| Ok("stub".into()))
                .with_side_effect(SideEffect::Network),
        );
        assert_eq!(invoker.names().len(), 5);
        assert_eq!(
            invoker.get("send_email").unwrap().side_effect(),
            SideEffect::Network
        );
    }

    #[test]
    fn test_confined_path_stays_under_root() {
        let root = Path::new("/srv/knowledge");
        assert_eq!(
            confined_path(root, "client/domain.md", "knowledge").unwrap(),
            root.join("client/domain.md")
        );
        let err = confined_path(root, "a/../../b.md", "knowledge").unwrap_err();
        assert_eq!(
            err,
            ToolError::InvalidArgs(
                "knowledge path 'a/../../b.md' may not leave the knowledge root".into()
            )
        );
        assert!(matches!(
            confined_path(root, "/etc/passwd", "report"),
            Err(ToolError::InvalidArgs(_))
        ));
    }
}

//! `commit_report`: write a report file and simulate the repository commit.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{confined_path, SideEffect, Tool, ToolArgs};
use crate::error::ToolError;

pub struct CommitReportTool {
    root: PathBuf,
    owner: String,
    repo: String,
}

impl CommitReportTool {
    pub fn new(root: PathBuf, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            root,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Reject paths that would escape the report root.
    fn target(&self, relative: &str) -> Result<PathBuf, ToolError> {
        confined_path(&self.root, relative, "report")
    }
}

#[async_trait]
impl Tool for CommitReportTool {
    fn name(&self) -> &str {
        "commit_report"
    }

    fn description(&self) -> &str {
        "Create or update a file in the project repository and commit it. \
         Requires the file path, content and a commit message."
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Filesystem
    }

    fn primary_arg(&self) -> &str {
        "content"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let relative = args.require("path")?;
        let content = args.get("content").unwrap_or_default();
        let message = args
            .get("message")
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Update {}", relative));

        let target = self.target(relative)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Failed(format!("create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| ToolError::Failed(format!("write {}: {}", target.display(), e)))?;

        tracing::info!(path = %target.display(), bytes = content.len(), "Report written");
        Ok(format!(
            "SUCCESS: File '{}' created/updated locally. Commit simulated to '{}/{}' with message: '{}'.",
            relative, self.owner, self.repo, message
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use tempfile::TempDir;

    fn tool(root: &Path) -> CommitReportTool {
        CommitReportTool::new(root.to_path_buf(), "MOCK_OWNER", "MOCK_REPO")
    }

    #[tokio::test]
    async fn test_writes_nested_file() {
        let tmp = TempDir::new().unwrap();
        let args = ToolArgs::new()
            .with("path", "client_reports/final_summary.md")
            .with("content", "# Final report")
            .with("message", "Add final report");

        let out = tool(tmp.path()).invoke(&args).await.unwrap();
        assert_eq!(
            out,
            "SUCCESS: File 'client_reports/final_summary.md' created/updated locally. \
             Commit simulated to 'MOCK_OWNER/MOCK_REPO' with message: 'Add final report'."
        );
        let written =
            std::fs::read_to_string(tmp.path().join("client_reports/final_summary.md")).unwrap();
        assert_eq!(written, "# Final report");
    }

    #[tokio::test]
    async fn test_default_commit_message() {
        let tmp = TempDir::new().unwrap();
        let args = ToolArgs::new().with("path", "r.md").with("content", "x");
        let out = tool(tmp.path()).invoke(&args).await.unwrap();
        assert!(out.ends_with("with message: 'Update r.md'."));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        for path in ["../outside.md", "reports/../../x.md", "/etc/passwd"] {
            let args = ToolArgs::new().with("path", path).with("content", "x");
            assert!(
                matches!(tool(tmp.path()).invoke(&args).await, Err(ToolError::InvalidArgs(_))),
                "{} should be rejected",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_io_failure_is_failed() {
        let tmp = TempDir::new().unwrap();
        // A file where a directory is expected.
        std::fs::write(tmp.path().join("blocker"), "x").unwrap();
        let args = ToolArgs::new()
            .with("path", "blocker/report.md")
            .with("content", "x");
        assert!(matches!(
            tool(tmp.path()).invoke(&args).await,
            Err(ToolError::Failed(_))
        ));
    }
}

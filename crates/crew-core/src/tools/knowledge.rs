//! `read_knowledge`: read a document from the client knowledge base.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{confined_path, SideEffect, Tool, ToolArgs};
use crate::error::ToolError;

pub struct ReadKnowledgeTool {
    root: Option<PathBuf>,
}

impl ReadKnowledgeTool {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ReadKnowledgeTool {
    fn name(&self) -> &str {
        "read_knowledge"
    }

    fn description(&self) -> &str {
        "Read a document from the client knowledge base, such as the industry \
         brief or the list of business metrics."
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Filesystem
    }

    fn primary_arg(&self) -> &str {
        "path"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let root = self
            .root
            .as_deref()
            .ok_or_else(|| ToolError::Unavailable("CREW_KNOWLEDGE_DIR is not configured".into()))?;
        let relative = args.require("path")?;
        let target = confined_path(root, relative, "knowledge")?;

        let bytes = tokio::fs::read(&target)
            .await
            .map_err(|e| ToolError::Failed(format!("read {}: {}", target.display(), e)))?;
        tracing::debug!(path = %target.display(), bytes = bytes.len(), "Knowledge document read");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_document_under_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("client")).unwrap();
        std::fs::write(
            tmp.path().join("client/domain.md"),
            "Retail energy supplier. Metrics: churn, margin, forecast error.",
        )
        .unwrap();

        let tool = ReadKnowledgeTool::new(Some(tmp.path().to_path_buf()));
        let out = tool
            .invoke(&ToolArgs::new().with("path", "client/domain.md"))
            .await
            .unwrap();
        assert_eq!(
            out,
            "Retail energy supplier. Metrics: churn, margin, forecast error."
        );
    }

    #[tokio::test]
    async fn test_unconfigured_root_is_unavailable() {
        let tool = ReadKnowledgeTool::new(None);
        let err = tool
            .invoke(&ToolArgs::new().with("path", "domain.md"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::Unavailable("CREW_KNOWLEDGE_DIR is not configured".into())
        );
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_the_root() {
        let tmp = TempDir::new().unwrap();
        let inner = tmp.path().join("kb");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(tmp.path().join("secret.txt"), "nope").unwrap();

        let tool = ReadKnowledgeTool::new(Some(inner));
        for path in ["../secret.txt", "docs/../../secret.txt", "/etc/hostname"] {
            assert!(
                matches!(
                    tool.invoke(&ToolArgs::new().with("path", path)).await,
                    Err(ToolError::InvalidArgs(_))
                ),
                "{} should be rejected",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_missing_document_fails() {
        let tmp = TempDir::new().unwrap();
        let tool = ReadKnowledgeTool::new(Some(tmp.path().to_path_buf()));
        assert!(matches!(
            tool.invoke(&ToolArgs::new().with("path", "absent.md")).await,
            Err(ToolError::Failed(_))
        ));
        assert!(matches!(
            tool.invoke(&ToolArgs::new()).await,
            Err(ToolError::InvalidArgs(_))
        ));
    }
}

//! `send_email`: compose a client email and record it in the email log
//! instead of sending it.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{SideEffect, Tool, ToolArgs};
use crate::error::ToolError;

pub struct SendEmailTool {
    log_path: PathBuf,
    /// Replaces the requested recipient when set.
    recipient_override: Option<String>,
}

impl SendEmailTool {
    pub fn new(log_path: PathBuf, recipient_override: Option<String>) -> Self {
        Self {
            log_path,
            recipient_override,
        }
    }

    async fn append(&self, entry: &str) -> std::io::Result<()> {
        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Compose and send (simulated) an email to the client in simple, conversational English."
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Filesystem
    }

    fn primary_arg(&self) -> &str {
        "body"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let recipient = match &self.recipient_override {
            Some(r) => r.as_str(),
            None => args.require("recipient")?,
        };
        let subject = args
            .get("subject")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("AutoML project update");
        let body = args.require("body")?;

        let entry = format!(
            "\n--- SENT EMAIL ({}) ---\nSubject: {}\nBody:\n{}\n--------------------------------\n",
            recipient, subject, body
        );
        self.append(&entry).await.map_err(|e| {
            ToolError::Failed(format!("append to {}: {}", self.log_path.display(), e))
        })?;

        tracing::info!(recipient, log = %self.log_path.display(), "Email simulated");
        Ok(format!(
            "SUCCESS: Email successfully composed and SIMULATED for client '{}'. Confirmation logged to {}.",
            recipient,
            self.log_path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args() -> ToolArgs {
        ToolArgs::new()
            .with("recipient", "client@example.com")
            .with("subject", "Your model is ready")
            .with("body", "Predictions are off by 28 cents on average.")
    }

    #[tokio::test]
    async fn test_appends_log_entries() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("automation_logs/email_log.txt");
        let tool = SendEmailTool::new(log.clone(), None);

        let out = tool.invoke(&args()).await.unwrap();
        assert!(out.starts_with(
            "SUCCESS: Email successfully composed and SIMULATED for client 'client@example.com'."
        ));
        tool.invoke(&args()).await.unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert_eq!(content.matches("--- SENT EMAIL (client@example.com) ---").count(), 2);
        assert!(content.contains("Subject: Your model is ready"));
    }

    #[tokio::test]
    async fn test_recipient_override() {
        let tmp = TempDir::new().unwrap();
        let tool = SendEmailTool::new(
            tmp.path().join("log.txt"),
            Some("override@example.com".into()),
        );
        let out = tool
            .invoke(&ToolArgs::new().with("body", "hello"))
            .await
            .unwrap();
        assert!(out.contains("client 'override@example.com'"));
    }

    #[tokio::test]
    async fn test_missing_recipient_without_override() {
        let tmp = TempDir::new().unwrap();
        let tool = SendEmailTool::new(tmp.path().join("log.txt"), None);
        assert!(matches!(
            tool.invoke(&ToolArgs::new().with("body", "hello")).await,
            Err(ToolError::InvalidArgs(_))
        ));
    }
}

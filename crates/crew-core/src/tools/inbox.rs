//! `check_inbox`: scan a local mail spool for alert subjects.
//!
//! The spool is a directory of RFC-822 style `*.eml` files. Unread messages
//! are the `*.eml` files; a message is marked seen by renaming it to
//! `*.eml.seen`. Files are scanned in file-name order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{SideEffect, Tool, ToolArgs};
use crate::error::ToolError;

pub struct CheckInboxTool {
    spool_dir: Option<PathBuf>,
}

impl CheckInboxTool {
    pub fn new(spool_dir: Option<PathBuf>) -> Self {
        Self { spool_dir }
    }

    async fn unread_messages(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("eml") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn scan(&self, dir: &Path, keywords: &[String]) -> std::io::Result<Option<String>> {
        for path in Self::unread_messages(dir).await? {
            // Headers of non-UTF-8 mail (Latin-1 and friends) decode lossily.
            let bytes = tokio::fs::read(&path).await?;
            let raw = String::from_utf8_lossy(&bytes);
            let Some(subject) = parse_subject(&raw) else {
                continue;
            };
            let lowered = subject.to_lowercase();
            if keywords.iter().any(|k| lowered.contains(k.as_str())) {
                let mut seen = path.clone().into_os_string();
                seen.push(".seen");
                tokio::fs::rename(&path, PathBuf::from(seen)).await?;
                return Ok(Some(subject));
            }
        }
        Ok(None)
    }
}

/// Extract the `Subject` header, unfolding continuation lines.
fn parse_subject(raw: &str) -> Option<String> {
    let mut lines = raw.lines().take_while(|l| !l.is_empty()).peekable();
    while let Some(line) = lines.next() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("subject") {
            continue;
        }
        let mut subject = value.trim().to_string();
        while let Some(next) = lines.peek() {
            if !next.starts_with([' ', '\t']) {
                break;
            }
            subject.push(' ');
            subject.push_str(next.trim());
            lines.next();
        }
        return Some(subject);
    }
    None
}

#[async_trait]
impl Tool for CheckInboxTool {
    fn name(&self) -> &str {
        "check_inbox"
    }

    fn description(&self) -> &str {
        "Search unread inbox messages for critical data science alert keywords \
         and report the subject of the first match."
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Network
    }

    fn primary_arg(&self) -> &str {
        "keywords"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let dir = self
            .spool_dir
            .as_deref()
            .ok_or_else(|| ToolError::Unavailable("INBOX_SPOOL_DIR is not configured".into()))?;
        if !dir.is_dir() {
            return Err(ToolError::Unavailable(format!(
                "inbox spool '{}' does not exist",
                dir.display()
            )));
        }

        let keywords: Vec<String> = args
            .require("keywords")?
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(ToolError::InvalidArgs("no keywords given".into()));
        }

        tracing::debug!(spool = %dir.display(), ?keywords, "Scanning inbox spool");
        match self.scan(dir, &keywords).await {
            Ok(Some(subject)) => Ok(format!("alert found: {}", subject)),
            Ok(None) => Ok("no alert found".to_string()),
            Err(e) => Ok(format!("error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_message(dir: &Path, name: &str, subject: &str) {
        let body = format!(
            "From: monitor@example.com\r\nSubject: {}\r\nTo: ops@example.com\r\n\r\nbody text\r\n",
            subject
        );
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_parse_subject_unfolds_continuations() {
        let raw = "From: a\nSubject: URGENT: model\n drift detected\nTo: b\n\nSubject: not a header";
        assert_eq!(
            parse_subject(raw).as_deref(),
            Some("URGENT: model drift detected")
        );
        assert_eq!(parse_subject("From: a\n\nbody"), None);
    }

    #[tokio::test]
    async fn test_first_matching_message_is_reported_and_marked_seen() {
        let tmp = TempDir::new().unwrap();
        write_message(tmp.path(), "001.eml", "Weekly newsletter");
        write_message(tmp.path(), "002.eml", "URGENT: Model Drift on churn model");
        write_message(tmp.path(), "003.eml", "Data quality FAILURE");

        let tool = CheckInboxTool::new(Some(tmp.path().to_path_buf()));
        let args = ToolArgs::new().with("keywords", "drift, failure");

        let out = tool.invoke(&args).await.unwrap();
        assert_eq!(out, "alert found: URGENT: Model Drift on churn model");
        assert!(tmp.path().join("002.eml.seen").exists());
        assert!(!tmp.path().join("002.eml").exists());

        let out = tool.invoke(&args).await.unwrap();
        assert_eq!(out, "alert found: Data quality FAILURE");

        let out = tool.invoke(&args).await.unwrap();
        assert_eq!(out, "no alert found");
    }

    #[tokio::test]
    async fn test_unconfigured_spool_is_unavailable() {
        let tool = CheckInboxTool::new(None);
        let args = ToolArgs::new().with("keywords", "drift");
        assert!(matches!(
            tool.invoke(&args).await,
            Err(ToolError::Unavailable(_))
        ));

        let tmp = TempDir::new().unwrap();
        let tool = CheckInboxTool::new(Some(tmp.path().join("missing")));
        assert!(matches!(
            tool.invoke(&args).await,
            Err(ToolError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_keywords_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let tool = CheckInboxTool::new(Some(tmp.path().to_path_buf()));
        let args = ToolArgs::new().with("keywords", " , ");
        assert!(matches!(
            tool.invoke(&args).await,
            Err(ToolError::InvalidArgs(_))
        ));
    }

    #[tokio::test]
    async fn test_non_utf8_message_does_not_block_the_scan() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("001.eml"),
            b"From: news@example.com\r\nSubject: Caf\xe9 newsletter\r\n\r\nbody\r\n",
        )
        .unwrap();
        write_message(tmp.path(), "002.eml", "URGENT model drift");

        let tool = CheckInboxTool::new(Some(tmp.path().to_path_buf()));
        let args = ToolArgs::new().with("keywords", "drift");

        let out = tool.invoke(&args).await.unwrap();
        assert_eq!(out, "alert found: URGENT model drift");
        assert!(tmp.path().join("002.eml.seen").exists());

        let out = tool.invoke(&args).await.unwrap();
        assert_eq!(out, "no alert found");

        let args = ToolArgs::new().with("keywords", "newsletter");
        let out = tool.invoke(&args).await.unwrap();
        assert_eq!(out, "alert found: Caf\u{fffd} newsletter");
    }
}

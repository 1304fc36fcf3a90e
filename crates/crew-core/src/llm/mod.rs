//! Text-completion backends.
//!
//! Agents without a tool answer their step through a [`CompletionBackend`].
//! The engine only ever sees `complete(request) -> text`; the backend decides
//! which service (if any) produces that text.

mod http;
mod offline;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::CompletionError;
use crate::models::OutputSchema;

pub use http::HttpCompletionBackend;
pub use offline::OfflineBackend;

/// One prompt for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Step being answered. Selection prompts use a synthetic id.
    pub step_id: String,
    pub agent: String,
    /// Agent persona.
    pub system: String,
    pub prompt: String,
    /// Present when the answer must be a JSON object of this shape.
    pub schema: Option<OutputSchema>,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Build the backend described by an `llm:` block.
///
/// `${VAR}` references in the block are resolved first. Hosted providers
/// require an API key.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionBackend>, CompletionError> {
    let config = config.resolved();
    match config.provider {
        LlmProvider::Offline => Ok(Arc::new(OfflineBackend::new())),
        LlmProvider::Ollama => Ok(Arc::new(HttpCompletionBackend::new(config))),
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let has_key = config
                .api_key
                .as_deref()
                .is_some_and(|k| !k.is_empty() && !k.starts_with("${"));
            if !has_key {
                return Err(CompletionError::NotConfigured(format!(
                    "provider {:?} requires llm.api_key",
                    config.provider
                )));
            }
            Ok(Arc::new(HttpCompletionBackend::new(config)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_offline_and_missing_key() {
        let offline = LlmConfig {
            provider: LlmProvider::Offline,
            ..LlmConfig::default()
        };
        assert_eq!(from_config(&offline).unwrap().name(), "offline");

        let anthropic = LlmConfig {
            provider: LlmProvider::Anthropic,
            api_key: Some("${CREW_TEST_UNSET_API_KEY}".into()),
            ..LlmConfig::default()
        };
        assert!(matches!(
            from_config(&anthropic),
            Err(CompletionError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_from_config_ollama_needs_no_key() {
        let backend = from_config(&LlmConfig::default()).unwrap();
        assert_eq!(backend.name(), "ollama");
    }
}

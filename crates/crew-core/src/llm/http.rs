//! HTTP completion backend.
//!
//! Speaks two wire formats:
//! - Anthropic Messages API: `POST {base_url}/v1/messages`
//! - OpenAI-compatible chat completions (OpenAI, Ollama):
//!   `POST {base_url}/chat/completions`

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{CompletionBackend, CompletionRequest};
use crate::config::{LlmConfig, LlmProvider};
use crate::error::CompletionError;

pub struct HttpCompletionBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpCompletionBackend {
    /// `config` is expected to be resolved already.
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    fn user_prompt(request: &CompletionRequest) -> String {
        match &request.schema {
            Some(schema) => format!("{}\n\n{}", request.prompt, schema.instructions()),
            None => request.prompt.clone(),
        }
    }

    fn temperature(&self) -> Option<Value> {
        self.config
            .temperature
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
        headers: &[(&str, String)],
    ) -> Result<Value, CompletionError> {
        let mut builder = self
            .client
            .post(url)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        let response = builder.json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text)
            .map_err(|e| CompletionError::Malformed(format!("invalid JSON body: {}", e)))
    }

    async fn call_anthropic(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": 4096,
            "messages": [{ "role": "user", "content": Self::user_prompt(request) }],
        });
        if !request.system.is_empty() {
            body["system"] = Value::String(request.system.clone());
        }
        if let Some(temp) = self.temperature() {
            body["temperature"] = temp;
        }

        tracing::debug!(url = %url, model = %self.config.model, step = %request.step_id, "Calling Anthropic API");
        let headers = [
            ("x-api-key", self.config.api_key.clone().unwrap_or_default()),
            ("anthropic-version", "2023-06-01".to_string()),
        ];
        let json = self.post(&url, &body, &headers).await?;

        anthropic_text(&json)
    }

    async fn call_chat_completions(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, CompletionError> {
        let url = chat_completions_url(&self.config);
        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system }));
        }
        messages.push(json!({ "role": "user", "content": Self::user_prompt(request) }));

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if let Some(temp) = self.temperature() {
            body["temperature"] = temp;
        }

        tracing::debug!(url = %url, model = %self.config.model, step = %request.step_id, "Calling chat completions API");
        let headers: Vec<(&str, String)> = self
            .config
            .api_key
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| ("Authorization", format!("Bearer {}", k)))
            .collect();
        let json = self.post(&url, &body, &headers).await?;

        chat_completion_text(&json)
    }
}

/// Text of a Messages API response: every `text` block joined by newlines.
fn anthropic_text(json: &Value) -> Result<String, CompletionError> {
    json.get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .map(str::to_string)
                .reduce(|a, b| format!("{}\n{}", a, b))
        })
        .ok_or_else(|| CompletionError::Malformed("no text content blocks".into()))
}

/// Text of a chat completions response: `choices[0].message.content`.
fn chat_completion_text(json: &Value) -> Result<String, CompletionError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| CompletionError::Malformed("no choices[0].message.content".into()))
}

/// Ollama serves the OpenAI-compatible API under `/v1`.
fn chat_completions_url(config: &LlmConfig) -> String {
    let base = config.base_url.trim_end_matches('/');
    match config.provider {
        LlmProvider::Ollama if !base.ends_with("/v1") => format!("{}/v1/chat/completions", base),
        _ => format!("{}/chat/completions", base),
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    fn name(&self) -> &str {
        match self.config.provider {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Ollama => "ollama",
            LlmProvider::Offline => "offline",
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        match self.config.provider {
            LlmProvider::Anthropic => self.call_anthropic(request).await,
            LlmProvider::OpenAi | LlmProvider::Ollama => self.call_chat_completions(request).await,
            LlmProvider::Offline => Err(CompletionError::NotConfigured(
                "offline provider has no HTTP endpoint".into(),
            )),
        }
    }
}

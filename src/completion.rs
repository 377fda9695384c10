//! Chat completion backends.
//!
//! | Config Value | Completer | Endpoint |
//! |-------------|-----------|----------|
//! | `"disabled"` | [`DisabledCompleter`] | none |
//! | `"openai"` | [`OpenAICompleter`] | `POST /v1/chat/completions` |
//! | `"ollama"` | [`OllamaCompleter`] | `POST /api/chat` (non-streaming) |
//!
//! Requests go through the same retry loop as the embedding providers.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use school_counselor_core::completion::ChatMessage;
use school_counselor_core::Completer;

use crate::config::CompletionConfig;
use crate::embedding::{
    http_client, openai_api_key, post_json_with_retry, OLLAMA_BASE_URL, OPENAI_BASE_URL,
};

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: AssistantMessage,
}

/// Used when `completion.provider = "disabled"`. Every in-scope question
/// gets the apology text.
pub struct DisabledCompleter;

#[async_trait]
impl Completer for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

pub struct OpenAICompleter {
    model: String,
    temperature: f32,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Self::with_api_key(config, openai_api_key()?)
    }

    pub fn with_api_key(config: &CompletionConfig, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        let base = config
            .url
            .as_deref()
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/');

        Ok(Self {
            model,
            temperature: config.temperature,
            endpoint: format!("{}/v1/chat/completions", base),
            api_key,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::to_value(OpenAIChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
        })?;
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        let parsed: OpenAIChatResponse =
            serde_json::from_value(json).context("failed to parse OpenAI response")?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no answer"))
    }
}

pub struct OllamaCompleter {
    model: String,
    temperature: f32,
    endpoint: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for Ollama provider"))?;
        let base = config
            .url
            .as_deref()
            .unwrap_or(OLLAMA_BASE_URL)
            .trim_end_matches('/');

        Ok(Self {
            model,
            temperature: config.temperature,
            endpoint: format!("{}/api/chat", base),
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::to_value(OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        })?;
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        let parsed: OllamaChatResponse =
            serde_json::from_value(json).context("failed to parse Ollama response")?;
        parsed
            .message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Ollama response contained no answer"))
    }
}

/// Create the [`Completer`] named by `completion.provider`.
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAICompleter::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompleter::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_request_shape() {
        let messages = [ChatMessage::system("be nice"), ChatMessage::user("hi")];
        let body = serde_json::to_value(OpenAIChatRequest {
            model: "gpt-4o-mini",
            temperature: 0.5,
            messages: &messages,
        })
        .unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_ollama_request_is_not_streaming() {
        let messages = [ChatMessage::user("hi")];
        let body = serde_json::to_value(OllamaChatRequest {
            model: "llama3.2",
            messages: &messages,
            stream: false,
            options: OllamaOptions { temperature: 0.7 },
        })
        .unwrap();
        assert_eq!(body["stream"], false);
        assert!(body["options"]["temperature"].as_f64().is_some());
    }

    #[tokio::test]
    async fn test_disabled_completer_fails() {
        let completer = create_completer(&CompletionConfig::default()).unwrap();
        assert_eq!(completer.model_name(), "disabled");
        assert!(completer.complete(&[ChatMessage::user("hi")]).await.is_err());
    }
}

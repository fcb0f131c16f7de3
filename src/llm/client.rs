//! OpenAI-compatible chat completions client (Groq by default).

use crate::config::AgentConfig;
use crate::llm::ChatModel;
use crate::types::*;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// HTTP chat client for any `/v1/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatClient {
    /// Build a client from config. Fails when no API key is configured.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::with_api_key(config, config.resolved_api_key())
    }

    /// Build a client with an already resolved key.
    pub fn with_api_key(config: &AgentConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!(
                "No API key configured. Set `api_key` in the config file or export {} (or {})",
                config.api_key_env,
                crate::config::FALLBACK_API_KEY_ENV
            );
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: history,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Chat request to model {} ({} messages)", self.model, history.len());

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Chat completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Chat completion failed ({}): {}", status, body);
        }

        let body: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        if let Some(usage) = &body.usage {
            debug!(
                "Token usage: {} prompt, {} completion",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_openai_shape() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            max_tokens: 16,
            temperature: 0.0,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "m",
                "messages": [
                    {"role": "system", "content": "s"},
                    {"role": "user", "content": "u"}
                ],
                "max_tokens": 16,
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let config = AgentConfig::default();
        let key = config.resolve_api_key_with(|_| None);
        let err = ChatClient::with_api_key(&config, key).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
        assert!(ChatClient::with_api_key(&config, "  ".into()).is_err());
    }

    #[test]
    fn base_url_is_normalised() {
        let config = AgentConfig {
            api_key: "k".into(),
            api_url: "https://example.test/openai/".into(),
            ..AgentConfig::default()
        };
        let client = ChatClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://example.test/openai");
        assert_eq!(client.model(), config.model);
    }
}

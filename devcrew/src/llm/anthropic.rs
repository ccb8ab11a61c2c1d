//! Claude Messages API client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatModel, MAX_TOKENS, TEMPERATURE, check_status, http_client};
use crate::settings::{ApiKey, Provider};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Response from the Messages API.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl ApiResponse {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Claude API client.
pub struct AnthropicClient {
    api_key: ApiKey,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: ApiKey) -> Result<Self> {
        Ok(Self {
            api_key,
            model: "claude-3-7-sonnet-20250219".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: http_client()?,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Send a conversation to Claude and get a response.
    pub async fn chat(&self, system: &str, messages: &[Message]) -> Result<ApiResponse> {
        let body = serde_json::json!({
            "model": &self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "system": system,
            "messages": messages,
        });

        tracing::debug!(model = %self.model, "POST /v1/messages");
        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to call Claude API")?;

        check_status(resp, Provider::Anthropic)
            .await?
            .json::<ApiResponse>()
            .await
            .context("Failed to parse Claude response")
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let messages = [Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        let resp = self.chat(system, &messages).await?;
        if let Some(usage) = &resp.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = resp.stop_reason.as_deref().unwrap_or("-"),
                "Claude usage"
            );
        }
        Ok(resp.text())
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_skips_non_text_blocks() {
        let resp: ApiResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "plan "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "here"}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(resp.text(), "plan here");
    }
}

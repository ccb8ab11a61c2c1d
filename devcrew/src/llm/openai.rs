//! OpenAI Chat Completions client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatModel, MAX_TOKENS, TEMPERATURE, check_status, http_client};
use crate::settings::{ApiKey, Provider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    api_key: ApiKey,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: ApiKey) -> Result<Self> {
        Ok(Self {
            api_key,
            model: "gpt-4o".to_string(),
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
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        tracing::debug!(model = %self.model, "POST /v1/chat/completions");
        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .context("Failed to call OpenAI API")?;

        let parsed: ChatResponse = check_status(resp, Provider::Openai)
            .await?
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("OpenAI response had no choices")?;
        tracing::debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("-"),
            "OpenAI completion"
        );
        Ok(choice.message.content.unwrap_or_default())
    }

    fn provider(&self) -> Provider {
        Provider::Openai
    }

    fn model(&self) -> &str {
        &self.model
    }
}

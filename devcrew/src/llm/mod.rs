//! Chat-model clients, one per hosted provider.
//!
//! Every role talks to its model through [`ChatModel`]: a system prompt
//! plus one user message in, plain text out. The pipeline never needs
//! more than a single turn.

use anyhow::Result;
use async_trait::async_trait;

use crate::settings::{Provider, RoleAssignment};

pub mod anthropic;
pub mod google;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use google::GoogleClient;
pub use openai::OpenAiClient;

/// Output token cap for every provider.
pub const MAX_TOKENS: u32 = 4096;

/// Sampling temperature for every provider.
pub const TEMPERATURE: f32 = 0.0;

/// Request timeout for provider calls.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// A single-turn text completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `prompt` as the user message under `system` and return the
    /// full text response.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    fn provider(&self) -> Provider;

    fn model(&self) -> &str;
}

/// Build the HTTP client for a role's provider.
pub fn client_for(assignment: &RoleAssignment) -> Result<Box<dyn ChatModel>> {
    let key = assignment.api_key.clone();
    let model = assignment.model.as_str();
    let base_url = assignment.base_url.as_deref();
    let client: Box<dyn ChatModel> = match assignment.provider {
        Provider::Anthropic => {
            let mut client = AnthropicClient::new(key)?.with_model(model);
            if let Some(url) = base_url {
                client = client.with_base_url(url);
            }
            Box::new(client)
        }
        Provider::Openai => {
            let mut client = OpenAiClient::new(key)?.with_model(model);
            if let Some(url) = base_url {
                client = client.with_base_url(url);
            }
            Box::new(client)
        }
        Provider::Google => {
            let mut client = GoogleClient::new(key)?.with_model(model);
            if let Some(url) = base_url {
                client = client.with_base_url(url);
            }
            Box::new(client)
        }
    };
    Ok(client)
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    use anyhow::Context;
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")
}

/// Turn a non-2xx response into an error carrying the body.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    provider: Provider,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{provider} API error {status}: {body}");
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ApiKey, Role};

    #[test]
    fn factory_picks_client_per_provider() {
        for provider in Provider::ALL {
            let assignment = RoleAssignment {
                role: Role::Developer,
                provider,
                model: format!("{provider}-model"),
                api_key: ApiKey::new("k"),
                base_url: None,
            };
            let client = client_for(&assignment).unwrap();
            assert_eq!(client.provider(), provider);
            assert_eq!(client.model(), format!("{provider}-model"));
        }
    }
}

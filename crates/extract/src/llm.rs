use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExtractError;

/// A hosted or local chat model: system + user message in, text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractError>;

    fn name(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2000,
        }
    }
}

/// How requests to the hosted endpoint are authorized. Token acquisition
/// happens outside this crate.
#[derive(Clone)]
pub enum Credential {
    ApiKey(String),
    Bearer(String),
    None,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credential::Bearer(_) => f.write_str("Bearer(***)"),
            Credential::None => f.write_str("None"),
        }
    }
}

/// Azure OpenAI chat-completions deployment.
#[derive(Clone)]
pub struct AzureChatClient {
    endpoint: String,
    deployment: String,
    api_version: String,
    credential: Credential,
    sampling: Sampling,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl AzureChatClient {
    pub fn new(
        endpoint: String,
        deployment: String,
        api_version: String,
        credential: Credential,
        sampling: Sampling,
        timeout: Duration,
    ) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            deployment,
            api_version,
            credential,
            sampling,
            client,
        })
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

#[async_trait]
impl ChatModel for AzureChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractError> {
        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
        };

        let mut builder = self.client.post(self.completions_url()).json(&request);
        builder = match &self.credential {
            Credential::ApiKey(key) => builder.header("api-key", key),
            Credential::Bearer(token) => builder.bearer_auth(token),
            Credential::None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        debug!(deployment = %self.deployment, choices = chat.choices.len(), "Chat completion received");

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ExtractError::EmptyReply)
    }

    fn name(&self) -> String {
        format!("azure:{}", self.deployment)
    }
}

/// Local Ollama server, `/api/generate` with JSON output forced.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    sampling: Sampling,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str, // "json" for structured output
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, sampling: Sampling, timeout: Duration) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            model,
            sampling,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let request = OllamaRequest {
            model: &self.model,
            system,
            prompt: user,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.sampling.temperature,
                num_predict: self.sampling.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let ollama_response: OllamaResponse = response.json().await?;
        if ollama_response.response.trim().is_empty() {
            return Err(ExtractError::EmptyReply);
        }
        Ok(ollama_response.response)
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        let client = AzureChatClient::new(
            "https://res.openai.azure.com/".to_string(),
            "gpt-4.1".to_string(),
            "2024-05-01-preview".to_string(),
            Credential::None,
            Sampling::default(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            client.completions_url(),
            "https://res.openai.azure.com/openai/deployments/gpt-4.1/chat/completions?api-version=2024-05-01-preview"
        );
        assert_eq!(client.name(), "azure:gpt-4.1");
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let shown = format!("{:?}", Credential::ApiKey("secret".into()));
        assert!(!shown.contains("secret"));
    }
}

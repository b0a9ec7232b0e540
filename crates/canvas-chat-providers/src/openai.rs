//! OpenAI Chat Completions API provider.
//!
//! Posts the whole conversation to the configured `/chat/completions` URL and
//! reads back the first choice. Works against OpenAI-compatible servers too.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use canvas_chat_core::types::{ChatMessage, MessageContent};

use crate::{CompletionRequest, Credentials, LlmProvider, ModelInfo};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiProvider {
    pub api_url: String,
    provider_id: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_url: Option<&str>) -> Self {
        Self {
            api_url: api_url
                .unwrap_or(OPENAI_CHAT_URL)
                .trim_end_matches('/')
                .to_string(),
            provider_id: "openai".into(),
            client: reqwest::Client::new(),
        }
    }

    /// Models endpoint next to the configured completions URL.
    pub fn models_url(&self) -> String {
        match self.api_url.strip_suffix("/chat/completions") {
            Some(base) => format!("{base}/models"),
            None => format!("{}/models", self.api_url),
        }
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

/// Pull the reply text out of a completion body.
fn extract_reply(body: &str) -> Option<String> {
    let completion: ChatCompletion = match serde_json::from_str(body) {
        Ok(c) => c,
        Err(e) => {
            warn!(%e, "Unreadable completion response");
            return None;
        }
    };
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|text| !text.trim().is_empty())
}

/// Build an error from a non-success response, preferring the API's own message.
fn api_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => anyhow::anyhow!("{} ({status})", envelope.error.message),
        Err(_) => anyhow::anyhow!("OpenAI API error {status}: {body}"),
    }
}

fn bearer(credentials: &Credentials) -> &str {
    match credentials {
        Credentials::ApiKey { api_key } => api_key,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.provider_id
    }

    fn format_messages(&self, messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| match &m.content {
                MessageContent::Text { text } => json!({
                    "role": m.role.as_str(),
                    "content": text,
                }),
                MessageContent::ImageUrl { url } => json!({
                    "role": m.role.as_str(),
                    "content": [{
                        "type": "image_url",
                        "image_url": { "url": url },
                    }],
                }),
            })
            .collect()
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<Option<String>> {
        let body = OpenAiRequest {
            model: request.model.clone(),
            messages: self.format_messages(&request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %body.model, api_url = %self.api_url, messages = body.messages.len(), "Calling chat completions");

        let response = self
            .client
            .post(&self.api_url)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", bearer(credentials)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }

        Ok(extract_reply(&text))
    }

    async fn list_models(&self, credentials: &Credentials) -> anyhow::Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.models_url())
            .header("authorization", format!("Bearer {}", bearer(credentials)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body: ModelsResponse = response.json().await?;
        Ok(body
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
            })
            .collect())
    }
}

//! Chat-completion provider abstraction.
//!
//! A provider turns an assembled conversation into one generated reply.
//! [`openai::OpenAiProvider`] speaks the OpenAI Chat Completions API, which
//! most hosted and local model servers also accept.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use canvas_chat_core::types::ChatMessage;

pub mod openai;

/// Credentials for authenticating with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credentials {
    #[serde(rename = "api_key")]
    ApiKey { api_key: String },
}

impl Credentials {
    pub fn api_key(api_key: impl Into<String>) -> Self {
        Credentials::ApiKey {
            api_key: api_key.into(),
        }
    }
}

/// A single, non-streaming completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// `None` leaves the response length to the provider.
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Model metadata reported by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

/// The core chat provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g., "openai").
    fn id(&self) -> &str;

    /// Convert chat messages into the provider's wire format.
    fn format_messages(&self, messages: &[ChatMessage]) -> Vec<serde_json::Value>;

    /// Request one completion.
    ///
    /// `Ok(None)` means the provider answered but the reply held no readable
    /// text. Transport and API errors are returned as `Err`.
    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<Option<String>>;

    /// List available models from this provider.
    async fn list_models(&self, credentials: &Credentials) -> anyhow::Result<Vec<ModelInfo>>;
}

//! Catalogue of known chat models and their input token limits.

use serde::Serialize;

use crate::config::Settings;

/// Metadata for a chat model the generator knows how to budget for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatModel {
    pub name: &'static str,
    /// Tokenizer family used to count this model's tokens.
    pub encoding: &'static str,
    pub input_token_limit: usize,
}

pub const CHAT_MODELS: &[ChatModel] = &[
    ChatModel {
        name: "gpt-3.5-turbo",
        encoding: "cl100k_base",
        input_token_limit: 4_096,
    },
    ChatModel {
        name: "gpt-3.5-turbo-16k",
        encoding: "cl100k_base",
        input_token_limit: 16_384,
    },
    ChatModel {
        name: "gpt-4",
        encoding: "cl100k_base",
        input_token_limit: 8_192,
    },
    ChatModel {
        name: "gpt-4-32k",
        encoding: "cl100k_base",
        input_token_limit: 32_768,
    },
    ChatModel {
        name: "gpt-4-turbo",
        encoding: "cl100k_base",
        input_token_limit: 128_000,
    },
    ChatModel {
        name: "gpt-4o",
        encoding: "o200k_base",
        input_token_limit: 128_000,
    },
    ChatModel {
        name: "gpt-4o-mini",
        encoding: "o200k_base",
        input_token_limit: 128_000,
    },
    ChatModel {
        name: "o1-mini",
        encoding: "o200k_base",
        input_token_limit: 128_000,
    },
];

/// Look up a model by exact name.
pub fn chat_model(name: &str) -> Option<&'static ChatModel> {
    CHAT_MODELS.iter().find(|m| m.name == name)
}

/// Token budget for the conversation history sent with one request.
///
/// The model's input limit, capped by `max_input_tokens` when that is set.
/// Custom models have no limit of their own.
pub fn input_token_limit(settings: &Settings) -> usize {
    let model_limit = chat_model(&settings.model)
        .map(|m| m.input_token_limit)
        .unwrap_or(usize::MAX);

    if settings.max_input_tokens > 0 {
        model_limit.min(settings.max_input_tokens as usize)
    } else {
        model_limit
    }
}

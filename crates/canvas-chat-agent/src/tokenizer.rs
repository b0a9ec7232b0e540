//! Token counting and truncation.

use tiktoken_rs::CoreBPE;
use tracing::debug;

use canvas_chat_core::models::chat_model;

pub type Token = u32;

/// Encoding used for models outside the catalogue.
pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Splits text into model tokens and back.
pub trait Tokenizer: Send + Sync {
    /// Encoding family name, for logs.
    fn name(&self) -> &str;

    fn encode(&self, text: &str) -> Vec<Token>;

    fn decode(&self, tokens: &[Token]) -> anyhow::Result<String>;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Text of the first `max_tokens` tokens of `text`.
    ///
    /// A cut that lands inside a multi-byte character backs off to the last
    /// token boundary that decodes cleanly.
    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.encode(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(prefix) = self.decode(&tokens[..end]) {
                return prefix;
            }
            end -= 1;
        }
        String::new()
    }
}

/// Byte-pair encoder for an OpenAI encoding family.
pub struct BpeTokenizer {
    encoding: &'static str,
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Load the ranks for `encoding` (`cl100k_base` or `o200k_base`).
    pub fn new(encoding: &str) -> anyhow::Result<Self> {
        let (encoding, bpe) = match encoding {
            "o200k_base" => ("o200k_base", tiktoken_rs::o200k_base()?),
            "cl100k_base" => ("cl100k_base", tiktoken_rs::cl100k_base()?),
            other => anyhow::bail!("Unsupported token encoding '{other}'"),
        };
        debug!(encoding, "Tokenizer loaded");
        Ok(Self { encoding, bpe })
    }
}

impl Tokenizer for BpeTokenizer {
    fn name(&self) -> &str {
        self.encoding
    }

    fn encode(&self, text: &str) -> Vec<Token> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[Token]) -> anyhow::Result<String> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| anyhow::anyhow!("Token decode failed: {e}"))
    }
}

/// Tokenizer for the model's encoding family. Unknown models use `cl100k_base`.
pub fn tokenizer_for_model(model: &str) -> anyhow::Result<BpeTokenizer> {
    let encoding = chat_model(model).map_or(DEFAULT_ENCODING, |m| m.encoding);
    BpeTokenizer::new(encoding)
}

//! Configuration loading, validation, and resolved settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a critical-thinking assistant bot. \
Consider the intent of my questions before responding. \
Do not restate my information unless I ask for it. \
Do not include caveats or disclaimers. \
Use step-by-step reasoning. Be brief.";

/// Top-level Canvas Chat configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Note generation settings as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key, used when `api_key` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Full chat-completions endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Cap on history tokens per request (0 = model limit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u32>,

    /// Cap on generated tokens (0 = provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_tokens: Option<u32>,

    /// How many ancestors back to read (0 = unlimited).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub debug: bool,
}

impl ChatConfig {
    /// Resolve the API key: check `api_key` field first, then `api_key_env` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "canvas_chat_agent=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Flat, fully-defaulted view of the chat settings.
///
/// This is what the generator reads; it never writes settings back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_input_tokens: u32,
    pub max_response_tokens: u32,
    pub max_depth: u32,
    pub system_prompt: String,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_input_tokens: 0,
            max_response_tokens: 0,
            max_depth: 0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            debug: false,
        }
    }
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::CanvasChatError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::CanvasChatError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw)?;

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::CanvasChatError::Config(e.to_string()))?;

        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    fn chat(&self) -> Option<&ChatConfig> {
        self.chat.as_ref()
    }

    pub fn api_url(&self) -> String {
        self.chat()
            .and_then(|c| c.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn model(&self) -> String {
        self.chat()
            .and_then(|c| c.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn temperature(&self) -> f64 {
        self.chat()
            .and_then(|c| c.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_input_tokens(&self) -> u32 {
        self.chat().and_then(|c| c.max_input_tokens).unwrap_or(0)
    }

    pub fn max_response_tokens(&self) -> u32 {
        self.chat().and_then(|c| c.max_response_tokens).unwrap_or(0)
    }

    pub fn max_depth(&self) -> u32 {
        self.chat().and_then(|c| c.max_depth).unwrap_or(0)
    }

    pub fn system_prompt(&self) -> String {
        self.chat()
            .and_then(|c| c.system_prompt.clone())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    pub fn debug(&self) -> bool {
        self.chat().is_some_and(|c| c.debug)
    }

    pub fn api_key(&self) -> Option<String> {
        self.chat().and_then(|c| c.resolve_api_key())
    }

    /// Resolve every chat setting into a [`Settings`] snapshot.
    pub fn settings(&self) -> Settings {
        Settings {
            api_key: self.api_key(),
            api_url: self.api_url(),
            model: self.model(),
            temperature: self.temperature(),
            max_input_tokens: self.max_input_tokens(),
            max_response_tokens: self.max_response_tokens(),
            max_depth: self.max_depth(),
            system_prompt: self.system_prompt(),
            debug: self.debug(),
        }
    }

    /// Get a config value by dotted path (e.g. "chat.model", "logging.level").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;

        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            anyhow::bail!("Empty path");
        };

        // Navigate to the parent of the target key
        let mut current = &mut json;
        for segment in parents {
            if !current.get(*segment).is_some_and(|v| v.is_object()) {
                current[*segment] = serde_json::json!({});
            }
            current = current
                .get_mut(*segment)
                .ok_or_else(|| anyhow::anyhow!("Cannot navigate to '{segment}'"))?;
        }

        current[*last] = value;

        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.api_key().is_none() {
            warnings.push("No API key configured (set chat.api_key or chat.api_key_env)".into());
        }

        let temperature = self.temperature();
        if !(0.0..=2.0).contains(&temperature) {
            errors.push(format!("Temperature must be between 0 and 2, got {temperature}"));
        }

        if self.api_url().trim().is_empty() {
            errors.push("API URL cannot be empty".to_string());
        }

        if crate::models::chat_model(&self.model()).is_none() && self.max_input_tokens() == 0 {
            warnings.push(format!(
                "Model '{}' is not in the catalogue; history will not be token-limited",
                self.model()
            ));
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Canvas Chat data: `~/.canvas_chat/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".canvas_chat")
}

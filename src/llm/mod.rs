mod ollama;
mod openai;

use crate::types::ChatMessage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Base URL used when only a DeepSeek key is configured
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// A chat-completion call against the external model
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Full transcript, including any leading system instruction
    pub messages: Vec<ChatMessage>,
    /// Maximum response length in tokens (provider-dependent)
    pub max_tokens: Option<u32>,
    /// Timeout for the request
    pub timeout: Duration,
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated text, verbatim
    pub text: String,
    pub metadata: ResponseMetadata,
}

/// Metadata about the LLM response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "openai", "ollama")
    pub provider: String,
    /// Model name used
    pub model: String,
    /// Tokens consumed (if available)
    pub tokens_used: Option<u32>,
    /// Latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat completion
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Which backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Any OpenAI-compatible chat completions API (OpenAI, DeepSeek, ...)
    OpenAi,
    Ollama,
}

impl ProviderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "openai" | "deepseek" => Some(ProviderKind::OpenAi),
            "ollama" => Some(ProviderKind::Ollama),
            _ => None,
        }
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Explicit provider choice; `None` picks OpenAI when a key is set, else Ollama
    pub provider: Option<ProviderKind>,
    /// OpenAI-compatible API key
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible base URL (`None` = api.openai.com)
    pub openai_base_url: Option<String>,
    /// OpenAI-compatible model to use
    pub openai_model: String,
    /// Ollama base URL
    pub ollama_base_url: Option<String>,
    /// Ollama model to use
    pub ollama_model: String,
    /// Timeout for chat relay calls
    pub chat_timeout: Duration,
    /// Timeout for classification calls; classification is heavier and less time-critical
    pub guess_timeout: Duration,
    /// Max tokens for chat replies
    pub chat_max_tokens: u32,
    /// Max tokens for a classification, enough for a single word
    pub guess_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            openai_api_key: None,
            openai_base_url: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: Some("http://localhost:11434".to_string()),
            ollama_model: "llama3.2".to_string(),
            chat_timeout: Duration::from_secs(30),
            guess_timeout: Duration::from_secs(45),
            chat_max_tokens: 300,
            guess_max_tokens: 5,
        }
    }
}

/// Read an env var, treating blank values as unset
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|s| s.parse().ok())
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let provider = env_string("LLM_PROVIDER").and_then(|value| {
            let kind = ProviderKind::parse(&value);
            if kind.is_none() {
                tracing::warn!(value, "Unknown LLM_PROVIDER, choosing automatically");
            }
            kind
        });

        // A bare DEEPSEEK_API_KEY implies the DeepSeek endpoint and model
        let deepseek_key = env_string("DEEPSEEK_API_KEY");
        let (openai_api_key, default_base_url, default_model) = match env_string("OPENAI_API_KEY")
        {
            Some(key) => (Some(key), None, defaults.openai_model.clone()),
            None if deepseek_key.is_some() => (
                deepseek_key,
                Some(DEEPSEEK_BASE_URL.to_string()),
                "deepseek-chat".to_string(),
            ),
            None => (None, None, defaults.openai_model.clone()),
        };

        let ollama_base_url = match std::env::var("OLLAMA_BASE_URL") {
            Ok(url) => {
                let trimmed = url.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(_) => defaults.ollama_base_url.clone(),
        };

        Self {
            provider,
            openai_api_key,
            openai_base_url: env_string("OPENAI_BASE_URL").or(default_base_url),
            openai_model: env_string("OPENAI_MODEL").unwrap_or(default_model),
            ollama_base_url,
            ollama_model: env_string("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            chat_timeout: env_parse("LLM_CHAT_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.chat_timeout),
            guess_timeout: env_parse("LLM_GUESS_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.guess_timeout),
            chat_max_tokens: env_parse("LLM_CHAT_MAX_TOKENS").unwrap_or(defaults.chat_max_tokens),
            guess_max_tokens: env_parse("LLM_GUESS_MAX_TOKENS")
                .unwrap_or(defaults.guess_max_tokens),
        }
    }

    /// Resolve which provider this config selects
    pub fn provider_kind(&self) -> Option<ProviderKind> {
        match self.provider {
            Some(kind) => Some(kind),
            None if self.openai_api_key.is_some() => Some(ProviderKind::OpenAi),
            None if self.ollama_base_url.is_some() => Some(ProviderKind::Ollama),
            None => None,
        }
    }

    /// Build the single provider every request goes to
    pub fn build_provider(&self) -> LlmResult<Arc<dyn LlmProvider>> {
        match self.provider_kind() {
            Some(ProviderKind::OpenAi) => {
                let api_key = self.openai_api_key.clone().ok_or_else(|| {
                    LlmError::ConfigError(
                        "OpenAI provider selected but OPENAI_API_KEY is not set".to_string(),
                    )
                })?;
                Ok(Arc::new(OpenAiProvider::new(
                    api_key,
                    self.openai_base_url.clone(),
                    self.openai_model.clone(),
                )))
            }
            Some(ProviderKind::Ollama) => {
                let base_url = self.ollama_base_url.clone().ok_or_else(|| {
                    LlmError::ConfigError(
                        "Ollama provider selected but OLLAMA_BASE_URL is empty".to_string(),
                    )
                })?;
                Ok(Arc::new(OllamaProvider::new(
                    base_url,
                    self.ollama_model.clone(),
                )))
            }
            None => Err(LlmError::ConfigError(
                "No LLM providers configured. Set OPENAI_API_KEY, DEEPSEEK_API_KEY or OLLAMA_BASE_URL"
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: &[&str] = &[
        "LLM_PROVIDER",
        "OPENAI_API_KEY",
        "DEEPSEEK_API_KEY",
        "OPENAI_BASE_URL",
        "OPENAI_MODEL",
        "OLLAMA_BASE_URL",
        "OLLAMA_MODEL",
        "LLM_CHAT_TIMEOUT",
        "LLM_GUESS_TIMEOUT",
        "LLM_CHAT_MAX_TOKENS",
        "LLM_GUESS_MAX_TOKENS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.ollama_model, "llama3.2");
        assert_eq!(config.chat_timeout, Duration::from_secs(30));
        assert_eq!(config.guess_timeout, Duration::from_secs(45));
        assert!(config.guess_timeout > config.chat_timeout);
        assert_eq!(config.provider_kind(), Some(ProviderKind::Ollama));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = LlmConfig::from_env();

        assert!(config.openai_api_key.is_none());
        assert_eq!(
            config.ollama_base_url.as_deref(),
            Some("http://localhost:11434")
        );
        assert_eq!(config.guess_max_tokens, 5);
        assert_eq!(config.provider_kind(), Some(ProviderKind::Ollama));
    }

    #[test]
    #[serial]
    fn test_from_env_deepseek_key() {
        clear_env();
        std::env::set_var("DEEPSEEK_API_KEY", "  sk-deep  ");
        let config = LlmConfig::from_env();
        clear_env();

        assert_eq!(config.openai_api_key.as_deref(), Some("sk-deep"));
        assert_eq!(config.openai_base_url.as_deref(), Some(DEEPSEEK_BASE_URL));
        assert_eq!(config.openai_model, "deepseek-chat");
        assert_eq!(config.provider_kind(), Some(ProviderKind::OpenAi));
    }

    #[test]
    #[serial]
    fn test_from_env_openai_key_wins() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "sk-open");
        std::env::set_var("DEEPSEEK_API_KEY", "sk-deep");
        std::env::set_var("LLM_GUESS_TIMEOUT", "60");
        let config = LlmConfig::from_env();
        clear_env();

        assert_eq!(config.openai_api_key.as_deref(), Some("sk-open"));
        assert!(config.openai_base_url.is_none());
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.guess_timeout, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_from_env_explicit_provider_without_key() {
        clear_env();
        std::env::set_var("LLM_PROVIDER", "openai");
        let config = LlmConfig::from_env();
        clear_env();

        assert_eq!(config.provider_kind(), Some(ProviderKind::OpenAi));
        assert!(matches!(
            config.build_provider(),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn test_no_provider_configured() {
        let config = LlmConfig {
            ollama_base_url: None,
            ..LlmConfig::default()
        };
        assert_eq!(config.provider_kind(), None);
        assert!(config.build_provider().is_err());
    }

    #[test]
    fn test_build_provider_names() {
        let config = LlmConfig::default();
        assert_eq!(config.build_provider().unwrap().name(), "ollama");

        let config = LlmConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.build_provider().unwrap().name(), "openai");
    }
}

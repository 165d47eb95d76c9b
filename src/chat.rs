//! Chat relay: plays the AI opponent by forwarding the transcript to the model.

use crate::llm::{CompletionRequest, LlmConfig, LlmError, LlmProvider, LlmResult};
use crate::types::ChatMessage;
use std::sync::Arc;
use std::time::Duration;

/// Persona the AI opponent keeps for the whole conversation
pub const CHAT_PERSONA_PROMPT: &str = "You are chatting with a stranger in an online game. \
    Write like a regular person typing on their phone: short, casual messages, lower-case is fine, \
    occasional typos are fine, no lists or formatting. Never say or hint that you are an AI, \
    a language model or an assistant. If asked, insist you are human.";

pub struct ChatRelay {
    provider: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
    max_tokens: u32,
}

impl ChatRelay {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            provider,
            timeout,
            max_tokens,
        }
    }

    pub fn from_config(provider: Option<Arc<dyn LlmProvider>>, config: &LlmConfig) -> Self {
        Self::new(provider, config.chat_timeout, config.chat_max_tokens)
    }

    /// Produce the opponent's next message. Failures go straight to the caller:
    /// there is no safe stand-in for free-form chat.
    pub async fn reply(&self, messages: &[ChatMessage]) -> LlmResult<String> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            LlmError::ConfigError("no LLM provider configured".to_string())
        })?;

        tracing::info!("Relaying chat history with {} messages", messages.len());

        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(ChatMessage::system(CHAT_PERSONA_PROMPT));
        request_messages.extend_from_slice(messages);

        let completion = provider
            .complete(CompletionRequest {
                messages: request_messages,
                max_tokens: Some(self.max_tokens),
                timeout: self.timeout,
            })
            .await?;

        tracing::debug!(
            provider = %completion.metadata.provider,
            model = %completion.metadata.model,
            latency_ms = completion.metadata.latency_ms,
            "Chat reply generated"
        );

        Ok(completion.text)
    }
}

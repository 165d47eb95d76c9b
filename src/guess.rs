//! Human-or-AI classification of a conversation transcript.
//!
//! The external model does the judging; this module frames the question,
//! validates the one-word answer and falls back to "human" whenever the answer
//! is unusable or the model cannot be reached. Callers always get a verdict.

use crate::llm::{CompletionRequest, LlmConfig, LlmError, LlmProvider, LlmResult};
use crate::types::{ChatMessage, Party};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Instruction prepended to every classification request
pub const GUESS_SYSTEM_PROMPT: &str = "You are the judge in a Turing-test game. \
    Read the conversation and decide whether the participant speaking in the 'user' role \
    is a human or an AI, based only on the linguistic style and patterns of their messages. \
    Answer with exactly one lower-case word: human or ai. Output nothing else.";

/// Verdict used whenever the model's answer cannot be trusted
pub const FALLBACK_VERDICT: Party = Party::Human;

/// What the guess endpoint reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessOutcome {
    pub guess: Party,
    /// Diagnostic attached when the model call itself failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GuessOutcome {
    fn verdict(guess: Party) -> Self {
        Self { guess, error: None }
    }

    fn fallback(error: impl Into<String>) -> Self {
        Self {
            guess: FALLBACK_VERDICT,
            error: Some(error.into()),
        }
    }
}

/// Normalize a raw model answer into a verdict, if it is one
pub fn parse_verdict(raw: &str) -> Option<Party> {
    Party::from_token(raw.trim().to_lowercase().as_str())
}

pub struct GuessPolicy {
    provider: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
    max_tokens: u32,
}

impl GuessPolicy {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            provider,
            timeout,
            max_tokens,
        }
    }

    pub fn from_config(provider: Option<Arc<dyn LlmProvider>>, config: &LlmConfig) -> Self {
        Self::new(provider, config.guess_timeout, config.guess_max_tokens)
    }

    /// Ask the model for its raw answer
    async fn ask(&self, history: &[ChatMessage]) -> LlmResult<String> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            LlmError::ConfigError("no LLM provider configured".to_string())
        })?;

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(GUESS_SYSTEM_PROMPT));
        messages.extend_from_slice(history);

        let completion = provider
            .complete(CompletionRequest {
                messages,
                max_tokens: Some(self.max_tokens),
                timeout: self.timeout,
            })
            .await?;

        tracing::debug!(
            provider = %completion.metadata.provider,
            model = %completion.metadata.model,
            latency_ms = completion.metadata.latency_ms,
            tokens_used = ?completion.metadata.tokens_used,
            "Classification answered"
        );

        Ok(completion.text)
    }

    /// Classify the counterpart in `history`. Never fails.
    pub async fn classify(&self, history: &[ChatMessage]) -> GuessOutcome {
        match self.ask(history).await {
            Ok(raw) => match parse_verdict(&raw) {
                Some(guess) => GuessOutcome::verdict(guess),
                None => {
                    tracing::warn!(raw = %raw, "Model answer is not a verdict, defaulting to human");
                    GuessOutcome::verdict(FALLBACK_VERDICT)
                }
            },
            Err(e) => {
                tracing::warn!("Classification failed: {}, defaulting to human", e);
                GuessOutcome::fallback(format!("classification unavailable: {}", e))
            }
        }
    }
}

//! Model-backed replies.
//!
//! Builds the fixed two-turn conversation (persona + the user's trimmed text)
//! and always hands back a non-empty string: completion failures and empty
//! completions are replaced with fixed fallbacks here, never propagated.

use std::sync::Arc;

use tracing::{error, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// Max tokens for a reply.
pub const REPLY_MAX_TOKENS: u32 = 600;

/// Sampling temperature for replies.
pub const REPLY_TEMPERATURE: f64 = 0.7;

/// Sent when the model returns nothing usable.
pub const EMPTY_REPLY_FALLBACK: &str = "I didn’t catch that—could you rephrase?";

/// Sent when the completion call fails.
pub const ERROR_REPLY_FALLBACK: &str = "Sorry—hit a snag. Try again in a moment.";

/// Turns user text into a model reply.
pub struct ReplyGenerator {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
}

impl ReplyGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    /// Exactly one system turn followed by exactly one user turn.
    pub fn build_request(&self, text: &str) -> CompletionRequest {
        CompletionRequest::new(vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(text),
        ])
        .with_temperature(REPLY_TEMPERATURE)
        .with_max_tokens(REPLY_MAX_TOKENS)
    }

    /// Ask the model for a reply. Never fails and never returns empty text.
    pub async fn generate(&self, text: &str) -> String {
        let request = self.build_request(text);

        match self.llm.complete(request).await {
            Ok(response) => {
                let reply = response.content.trim();
                if reply.is_empty() {
                    warn!(model = %self.llm.model_name(), "Empty completion, using fallback");
                    EMPTY_REPLY_FALLBACK.to_string()
                } else {
                    reply.to_string()
                }
            }
            Err(e) => {
                error!(model = %self.llm.model_name(), error = %e, "Completion failed");
                ERROR_REPLY_FALLBACK.to_string()
            }
        }
    }
}

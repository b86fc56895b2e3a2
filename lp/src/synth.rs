//! Plan synthesis over an `LlmClient`

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PlannerError;
use crate::llm::{CompletionRequest, LlmClient, LlmError, StopReason};

/// System prompt for plan generation
pub const PLAN_SYSTEM_PROMPT: &str = "You are a senior developer and technical lead who writes implementation plans. \
Your plans are precise, ordered and actionable, and a developer new to the project can follow them.";

/// Sends prompts to the selected model and returns its text
pub struct PlanSynthesizer {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl PlanSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        debug!(provider = client.provider(), %max_tokens, "PlanSynthesizer::new: called");
        Self { client, max_tokens }
    }

    pub fn provider(&self) -> &'static str {
        self.client.provider()
    }

    /// Generate a plan for an assembled prompt
    pub async fn synthesize(&self, prompt: &str) -> Result<String, PlannerError> {
        info!(provider = self.provider(), prompt_len = prompt.len(), "Synthesizing plan");
        self.ask(PLAN_SYSTEM_PROMPT, prompt).await
    }

    /// One completion call; empty output is an invalid response
    pub async fn ask(&self, system_prompt: &str, prompt: &str) -> Result<String, PlannerError> {
        debug!(prompt_len = prompt.len(), "PlanSynthesizer::ask: called");
        let request = CompletionRequest::single(system_prompt, prompt, self.max_tokens);
        let response = self.client.complete(request).await?;

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "PlanSynthesizer::ask: response received"
        );
        if response.stop_reason == StopReason::MaxTokens {
            warn!(max_tokens = self.max_tokens, "Model output was truncated at the token limit");
        }

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(LlmError::InvalidResponse("model returned no text".to_string()).into()),
        }
    }
}

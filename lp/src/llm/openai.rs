//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API. The body
//! builder and response parser are shared with the Azure OpenAI client, which
//! speaks the same wire format.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::OpenAIConfig;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client
    ///
    /// `base_url` overrides the configured one when set (OPENAI_BASE_URL).
    pub fn new(
        api_key: String,
        config: &OpenAIConfig,
        base_url: Option<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        debug!(model = %config.model, ?base_url, "OpenAIClient::new: called");
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| config.base_url.clone())
                .trim_end_matches('/')
                .to_string(),
            http,
            max_tokens,
            timeout,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        chat_request_body(Some(&self.model), request, self.max_tokens)
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let builder = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key));

        send_chat_request(builder, &body, self.timeout).await
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}

/// Build a Chat Completions body
///
/// `model` is omitted for Azure, where the deployment selects the model.
pub(super) fn chat_request_body(model: Option<&str>, request: &CompletionRequest, max_tokens_cap: u32) -> serde_json::Value {
    debug!(?model, %request.max_tokens, "chat_request_body: called");

    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": request.system_prompt,
    })];
    messages.extend(request.messages.iter().map(|m| {
        serde_json::json!({
            "role": m.role,
            "content": m.content,
        })
    }));

    let max_tokens = request.max_tokens.min(max_tokens_cap);

    let mut body = serde_json::json!({
        "messages": messages,
    });

    // GPT-5.x and o1/o3 models use max_completion_tokens instead of max_tokens
    let uses_completion_tokens = model
        .map(|m| m.starts_with("gpt-5") || m.starts_with("o1") || m.starts_with("o3"))
        .unwrap_or(false);

    if let Some(model) = model {
        body["model"] = serde_json::json!(model);
    }

    if uses_completion_tokens {
        body["max_completion_tokens"] = serde_json::json!(max_tokens);
    } else {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }

    body
}

/// Send a Chat Completions request and parse the reply
pub(super) async fn send_chat_request(
    builder: RequestBuilder,
    body: &serde_json::Value,
    timeout: Duration,
) -> Result<CompletionResponse, LlmError> {
    let response = builder
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::from_transport(e, timeout))?;

    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| LlmError::from_transport(e, timeout))?;

    if !(200..300).contains(&status) {
        debug!(%status, "send_chat_request: API error");
        return Err(LlmError::ApiError { status, message: text });
    }

    debug!("send_chat_request: success");
    let api_response: ChatResponse = serde_json::from_str(&text)?;
    Ok(parse_chat_response(api_response))
}

/// Parse a Chat Completions response
pub(super) fn parse_chat_response(api_response: ChatResponse) -> CompletionResponse {
    debug!(choices = api_response.choices.len(), "parse_chat_response: called");
    let choice = api_response.choices.into_iter().next();

    let (content, stop_reason) = match choice {
        Some(c) => (c.message.content, StopReason::from_openai(c.finish_reason.as_deref())),
        None => (None, StopReason::EndTurn),
    };

    let usage = api_response.usage.unwrap_or_default();
    CompletionResponse {
        content,
        stop_reason,
        usage: TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        },
    }
}

// Chat Completions response types

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

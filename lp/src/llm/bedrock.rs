//! AWS Bedrock client implementation
//!
//! Invokes Anthropic models on Bedrock through the InvokeModel API. The body is
//! the Anthropic Messages format; requests are SigV4 signed.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::sigv4::{self, AwsCredentials, SigningRequest, uri_encode};
use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};

const SERVICE: &str = "bedrock";
const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// AWS Bedrock client
pub struct BedrockClient {
    model: String,
    region: String,
    credentials: AwsCredentials,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl BedrockClient {
    /// Create a new client for `model` in `region`
    pub fn new(
        credentials: AwsCredentials,
        model: String,
        region: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        debug!(%model, %region, "BedrockClient::new: called");
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model,
            region,
            credentials,
            http,
            max_tokens,
            timeout,
        })
    }

    fn host(&self) -> String {
        format!("bedrock-runtime.{}.amazonaws.com", self.region)
    }

    /// Wire path; the model id is percent-encoded (`:` becomes `%3A`)
    fn invoke_path(&self) -> String {
        format!("/model/{}/invoke", uri_encode(&self.model, true))
    }

    /// Build the request body for the Anthropic Messages format
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        serde_json::json!({
            "anthropic_version": ANTHROPIC_VERSION,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": request.messages,
        })
    }

    /// Parse the Anthropic-format response
    fn parse_response(&self, api_response: BedrockResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "parse_response: called");
        let text: String = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                BedrockContentBlock::Text { text } => Some(text),
                BedrockContentBlock::Other => None,
            })
            .collect();

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            stop_reason: api_response
                .stop_reason
                .as_deref()
                .map(StopReason::from_anthropic)
                .unwrap_or(StopReason::EndTurn),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmClient for BedrockClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let host = self.host();
        let path = self.invoke_path();
        let payload = serde_json::to_vec(&self.build_request_body(&request))?;

        let signed = sigv4::sign(
            &self.credentials,
            &SigningRequest {
                method: "POST",
                host: &host,
                path: &path,
                headers: &[("content-type", "application/json"), ("accept", "application/json")],
                payload: &payload,
                region: &self.region,
                service: SERVICE,
                time: Utc::now(),
            },
        )?;

        let mut builder = self
            .http
            .post(format!("https://{}{}", host, path))
            .header("content-type", "application/json")
            .header("accept", "application/json");
        for (name, value) in signed {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(payload)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout))?;

        if !(200..300).contains(&status) {
            debug!(%status, "complete: API error");
            return Err(LlmError::ApiError { status, message: text });
        }

        debug!("complete: success");
        let api_response: BedrockResponse = serde_json::from_str(&text)?;
        Ok(self.parse_response(api_response))
    }

    fn provider(&self) -> &'static str {
        "bedrock"
    }
}

// Bedrock (Anthropic Messages) response types

#[derive(Debug, Deserialize)]
struct BedrockResponse {
    content: Vec<BedrockContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: BedrockUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum BedrockContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct BedrockUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

//! Azure OpenAI client
//!
//! Same Chat Completions wire format as OpenAI, addressed by deployment and
//! authenticated with an `api-key` header.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::openai::{chat_request_body, send_chat_request};
use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use crate::config::AzureConfig;

/// Azure OpenAI client
pub struct AzureOpenAIClient {
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl AzureOpenAIClient {
    /// Create a new client for `endpoint` (already resolved from env or config)
    pub fn new(
        api_key: String,
        endpoint: String,
        config: &AzureConfig,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        debug!(%endpoint, deployment = %config.deployment, "AzureOpenAIClient::new: called");
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            api_key,
            http,
            max_tokens,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl LlmClient for AzureOpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.deployment, %request.max_tokens, "complete: called");
        let body = chat_request_body(None, &request, self.max_tokens);
        let builder = self.http.post(self.url()).header("api-key", &self.api_key);
        send_chat_request(builder, &body, self.timeout).await
    }

    fn provider(&self) -> &'static str {
        "azure"
    }
}

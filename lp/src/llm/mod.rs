//! LLM client module for llmplanner
//!
//! One non-streaming completion call per plan. Provider selection lives in
//! [`provider`]; the clients only know their own wire format.

mod azure;
mod bedrock;
pub mod client;
mod error;
mod openai;
pub mod provider;
pub mod sigv4;
mod types;

pub use azure::AzureOpenAIClient;
pub use bedrock::BedrockClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use provider::{ProviderChoice, ProviderKind, connect, create_client, resolve_credentials};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

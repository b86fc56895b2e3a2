//! llmplanner - Memory Bank planner
//!
//! Turns a task brief plus a project's Memory Bank (six Markdown documents
//! under `memory-bank/`) into a step-by-step plan generated by an LLM, and
//! appends that plan to the brief.
//!
//! # Core Concepts
//!
//! - **Memory Bank**: a closed set of project documents, the model's only
//!   knowledge of the project
//! - **Clarification Gate**: briefs carrying placeholder markers (`TBD`) are
//!   not planned
//! - **One Provider**: OpenAI, Bedrock or Azure, selected once from credentials
//! - **Atomic Writes**: a brief is rewritten only after a plan arrives
//!
//! # Modules
//!
//! - [`memory`] - Memory Bank store
//! - [`instruction`] - Instruction documents
//! - [`context`] - Prompt assembly
//! - [`gate`] - Clarification gate
//! - [`synth`] - Plan synthesis
//! - [`updater`] - Plan appending
//! - [`workflow`] - init, plan and update
//! - [`llm`] - LLM clients and provider selection
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod analysis;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod llm;
pub mod memory;
pub mod persist;
pub mod prompts;
pub mod synth;
pub mod updater;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use error::PlannerError;
pub use gate::ClarificationGate;
pub use instruction::InstructionDocument;
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
pub use memory::{DocumentKind, MemoryDocument, MemoryStore};
pub use prompts::PromptLoader;
pub use synth::PlanSynthesizer;
pub use workflow::{Console, Workspace};

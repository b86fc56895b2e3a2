//! Planner error types

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::llm::LlmError;

/// Errors that terminate a planner invocation
///
/// None of these are retried. Each carries enough context to tell the
/// operator what to do next.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Memory bank not initialized: {} does not exist. Run `lp init` first.", .dir.display())]
    NotInitialized { dir: PathBuf },

    #[error("Instruction file not found: {}", .path.display())]
    MissingInstruction { path: PathBuf },

    #[error("Clarification required: instructions contain unresolved marker(s) {}", .markers.join(", "))]
    ClarificationRequired { markers: Vec<String> },

    #[error("{}", missing_credentials_message(.vars))]
    MissingCredentials { vars: Vec<String> },

    #[error("Unknown memory document '{name}'. Valid documents: {}", crate::memory::DocumentKind::names().join(", "))]
    UnknownDocument { name: String },

    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("Permission denied: {}", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt template error: {0}")]
    Prompt(String),
}

impl PlannerError {
    /// Wrap an I/O error, splitting out permission failures
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            PlannerError::PermissionDenied { path }
        } else {
            PlannerError::Io { path, source }
        }
    }

    /// Whether this error is the polite clarification halt
    pub fn is_clarification(&self) -> bool {
        matches!(self, PlannerError::ClarificationRequired { .. })
    }
}

fn missing_credentials_message(vars: &[String]) -> String {
    let mut msg = String::from("No LLM provider credentials found. Set one of the following:");
    for var in vars {
        msg.push_str("\n  export ");
        msg.push_str(var);
        msg.push_str("=<value>");
    }
    msg
}

//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::llm::ProviderKind;
use crate::llm::provider::{Env, ProcessEnv};
use crate::memory::DocumentKind;

/// llmplanner - plan features against a project Memory Bank
#[derive(Parser)]
#[command(
    name = "lp",
    about = "Turn a task brief plus the project's Memory Bank into an LLM-generated plan",
    version
)]
pub struct Cli {
    /// Project root holding the memory bank
    #[arg(short = 'C', long, global = true, default_value = ".", help = "Project root directory")]
    pub root: PathBuf,

    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Provider override (auto, openai, bedrock, azure)
    #[arg(long, global = true, help = "LLM provider: auto, openai, bedrock, azure")]
    pub provider: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the memory bank with placeholder documents
    Init {
        /// Also fill placeholder documents from a project scan (calls the LLM)
        #[arg(long)]
        generate: bool,
    },

    /// Generate a plan and append it to an instruction file
    Plan {
        /// Instruction file (relative to the project root)
        #[arg(value_name = "INSTRUCTION")]
        instruction: PathBuf,

        /// Ask clarifying questions interactively instead of halting on markers
        #[arg(long)]
        clarify: bool,
    },

    /// Merge new information into one memory bank document
    Update {
        /// Document name (projectbrief, productContext, activeContext, systemPatterns, techContext, progress)
        #[arg(value_name = "DOCUMENT")]
        document: String,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("llmplanner")
        .join("logs")
        .join("llmplanner.log")
}

/// Generate the after_help text with provider credential status and log path
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let env = ProcessEnv;
    let mut help = String::new();

    help.push_str("Providers (auto-selection order):\n");
    for kind in ProviderKind::PRECEDENCE {
        let vars = kind.credential_vars();
        let ready = vars.iter().all(|v| env.var(v).is_some());
        let icon = if ready { "\u{2705}" } else { "\u{274C}" };
        help.push_str(&format!("  {} {:<8} {}\n", icon, kind.name(), vars.join(" + ")));
    }

    help.push('\n');
    help.push_str("Memory documents:\n  ");
    help.push_str(&DocumentKind::names().join(", "));
    help.push('\n');

    help.push('\n');
    help.push_str(&format!("Logs: {}\n", get_log_path().display()));
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::try_parse_from(["lp", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init { generate: false }));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn test_cli_parse_init_generate() {
        let cli = Cli::try_parse_from(["lp", "init", "--generate"]).unwrap();
        assert!(matches!(cli.command, Command::Init { generate: true }));
    }

    #[test]
    fn test_cli_parse_plan_with_globals() {
        let cli = Cli::try_parse_from([
            "lp",
            "plan",
            "brief.txt",
            "--clarify",
            "-C",
            "/work/project",
            "--provider",
            "bedrock",
            "-l",
            "debug",
        ])
        .unwrap();

        match cli.command {
            Command::Plan { instruction, clarify } => {
                assert_eq!(instruction, PathBuf::from("brief.txt"));
                assert!(clarify);
            }
            other => panic!("Expected Plan, got {:?}", other),
        }
        assert_eq!(cli.root, PathBuf::from("/work/project"));
        assert_eq!(cli.provider.as_deref(), Some("bedrock"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_parse_update() {
        let cli = Cli::try_parse_from(["lp", "update", "progress"]).unwrap();
        match cli.command {
            Command::Update { document } => assert_eq!(document, "progress"),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["lp"]).is_err());
        assert!(Cli::try_parse_from(["lp", "plan"]).is_err());
    }

    #[test]
    fn test_after_help_mentions_providers_and_logs() {
        let help = generate_after_help();
        assert!(help.contains("openai"));
        assert!(help.contains("AWS_ACCESS_KEY_ID + AWS_SECRET_ACCESS_KEY"));
        assert!(help.contains("Logs:"));
        assert!(help.contains("systemPatterns"));
    }
}

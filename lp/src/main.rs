//! llmplanner - Memory Bank planner
//!
//! CLI entry point: init, plan and update.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use llmplanner::cli::{Cli, Command, generate_after_help, get_log_path};
use llmplanner::config::Config;
use llmplanner::error::PlannerError;
use llmplanner::llm;
use llmplanner::workflow::{self, Console, UpdateOutcome, Workspace};

fn parse_level(s: &str) -> Option<tracing::Level> {
    match s.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Log level comes from config before the full config load so loading itself is logged
    let config_log_level = Config::load_log_level(cli.config.as_ref(), &cli.root);
    if let Err(e) = setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()) {
        eprintln!("{} logging disabled: {:#}", "warning:".yellow(), e);
    }

    let config = Config::load(cli.config.as_ref(), &cli.root).context("Failed to load configuration")?;
    let ws = Workspace::new(cli.root.clone(), config);
    let provider = cli.provider.as_deref();

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Init { generate } => cmd_init(&ws, generate, provider).await,
        Command::Plan { instruction, clarify } => cmd_plan(&ws, &instruction, clarify, provider).await,
        Command::Update { document } => cmd_update(&ws, &document, provider).await,
    }
}

/// Scaffold the memory bank, optionally filling it from a project scan
async fn cmd_init(ws: &Workspace, generate: bool, provider: Option<&str>) -> Result<()> {
    debug!(%generate, "cmd_init: called");
    let store = ws.store();
    let report = workflow::init(ws)?;

    if report.created_dir {
        println!("{} Created {}", "\u{2713}".green(), store.dir().display());
    }
    for kind in &report.created {
        println!("{} {}", "\u{2713}".green(), kind.file_name());
    }
    for kind in &report.existing {
        println!("{}", format!("  {} (exists)", kind.file_name()).dimmed());
    }

    if generate {
        println!("Scanning project and generating memory bank...");
        let report = workflow::generate(ws, || llm::connect(&ws.config().llm, provider)).await?;
        for kind in &report.written {
            println!("{} {} generated", "\u{2713}".green(), kind.file_name());
        }
        for kind in &report.kept {
            println!("{}", format!("  {} kept (already has content)", kind.file_name()).dimmed());
        }
        for name in &report.ignored {
            println!("{} ignored unexpected file '{}'", "warning:".yellow(), name);
        }
    }

    println!("\nMemory bank ready. Fill in the documents, then run `lp plan <file>`.");
    Ok(())
}

/// Generate a plan and append it to the instruction file
async fn cmd_plan(ws: &Workspace, instruction: &Path, clarify: bool, provider: Option<&str>) -> Result<()> {
    debug!(?instruction, %clarify, "cmd_plan: called");
    println!("Gathering the memory bank for context...");

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout());
    let result = workflow::plan(ws, instruction, clarify, &mut console, || {
        llm::connect(&ws.config().llm, provider)
    })
    .await;

    match result {
        Ok(outcome) => {
            println!(
                "{} Plan appended to {} (provider: {})",
                "\u{2713}".green(),
                outcome.path.display(),
                outcome.provider
            );
            println!("Review the plan, check off tasks as you go, and keep the memory bank current with `lp update <document>`.");
            Ok(())
        }
        Err(e @ PlannerError::ClarificationRequired { .. }) => {
            println!(
                "{} The instructions still need clarification. Replace the marked placeholders, or re-run with --clarify.",
                "?".yellow()
            );
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Merge operator notes into one memory document
async fn cmd_update(ws: &Workspace, document: &str, provider: Option<&str>) -> Result<()> {
    debug!(%document, "cmd_update: called");
    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout());

    let outcome = workflow::update(ws, document, &mut console, || llm::connect(&ws.config().llm, provider)).await?;
    match outcome {
        UpdateOutcome::Updated(path) => {
            println!("{} Updated {}", "\u{2713}".green(), display_relative(ws.root(), &path).display());
        }
        UpdateOutcome::NoInput => {
            println!("{} Nothing entered; {} left unchanged.", "warning:".yellow(), document);
        }
    }
    Ok(())
}

fn display_relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

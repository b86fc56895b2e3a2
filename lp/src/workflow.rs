//! The three operator workflows: init, plan and update
//!
//! Each workflow receives the LLM client lazily through a `connect` closure so
//! that local failures (missing memory bank, missing brief, clarification
//! markers, unknown document) are reported before credentials are looked up.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{SourceFile, TextAnalysis, analyze_text, collect_sources, scan_project};
use crate::config::Config;
use crate::context::{Enrichment, assemble_with};
use crate::error::PlannerError;
use crate::gate::{self, ClarificationGate};
use crate::instruction::InstructionDocument;
use crate::llm::{LlmClient, LlmError};
use crate::memory::{DocumentKind, InitReport, MemoryStore};
use crate::prompts::PromptLoader;
use crate::synth::PlanSynthesizer;
use crate::updater::append_plan;

const CLARIFY_SYSTEM_PROMPT: &str = "You identify ambiguities in software task descriptions and ask short, specific questions.";
const UPDATE_SYSTEM_PROMPT: &str = "You maintain concise, accurate Markdown documentation for a software project.";
const INIT_SYSTEM_PROMPT: &str = "You are a software architect documenting a project. You answer with JSON only.";

/// Operator input and output for interactive steps
pub struct Console<R, W> {
    pub input: R,
    pub output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, text: &str) -> Result<(), PlannerError> {
        writeln!(self.output, "{}", text).map_err(|e| PlannerError::io("<stdout>", e))
    }

    fn read_until(&mut self, sentinel: &str) -> Result<String, PlannerError> {
        self.output.flush().map_err(|e| PlannerError::io("<stdout>", e))?;
        gate::read_until_sentinel(&mut self.input, sentinel).map_err(|e| PlannerError::io("<stdin>", e))
    }
}

/// Project root plus its configuration
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let root = root.into();
        debug!(?root, "Workspace::new: called");
        Self { root, config }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> MemoryStore {
        MemoryStore::with_dir_name(&self.root, &self.config.memory.dir)
    }

    pub fn gate(&self) -> ClarificationGate {
        ClarificationGate::new(self.config.clarify.markers.clone())
    }

    fn loader(&self) -> PromptLoader {
        PromptLoader::new(&self.root)
    }

    fn synthesizer(&self, client: Arc<dyn LlmClient>) -> PlanSynthesizer {
        PlanSynthesizer::new(client, self.config.llm.max_tokens)
    }
}

// init

/// Scaffold the memory bank; never touches existing documents
pub fn init(ws: &Workspace) -> Result<InitReport, PlannerError> {
    debug!(root = ?ws.root(), "init: called");
    ws.store().ensure_initialized()
}

/// What `init --generate` did with the model's files
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    /// Placeholder documents replaced with generated content
    pub written: Vec<DocumentKind>,
    /// Documents left alone because they already had real content
    pub kept: Vec<DocumentKind>,
    /// File names outside the memory bank set
    pub ignored: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedBank {
    files: Vec<GeneratedFile>,
}

#[derive(Debug, Deserialize)]
struct GeneratedFile {
    filename: String,
    content: String,
}

#[derive(Serialize)]
struct InitPrompt<'a> {
    project_name: &'a str,
    directories: &'a [String],
    files: &'a [String],
    languages: &'a [String],
    frameworks: &'a [String],
    file_types: &'a BTreeMap<String, usize>,
    readme: Option<&'a str>,
    sources: &'a [SourceFile],
}

/// Fill placeholder documents with model-written content from a project scan
///
/// Expects `init` to have run; the scaffold stays in place on any failure.
pub async fn generate<F>(ws: &Workspace, connect: F) -> Result<GenerateReport, PlannerError>
where
    F: FnOnce() -> Result<Arc<dyn LlmClient>, PlannerError>,
{
    debug!(root = ?ws.root(), "generate: called");
    let store = ws.store();
    let project = scan_project(ws.root(), &ws.config().memory.dir);
    let sources = collect_sources(ws.root(), &ws.config().memory.dir);

    let prompt = ws.loader().render(
        "init",
        &InitPrompt {
            project_name: &project.project_name,
            directories: &project.directories,
            files: &project.files,
            languages: &project.languages,
            frameworks: &project.frameworks,
            file_types: &project.file_types,
            readme: project.readme.as_deref(),
            sources: &sources,
        },
    )?;

    let synth = ws.synthesizer(connect()?);
    info!(provider = synth.provider(), "Generating memory bank");
    let reply = synth.ask(INIT_SYSTEM_PROMPT, &prompt).await?;

    let bank: GeneratedBank = serde_json::from_str(strip_code_fence(&reply))
        .map_err(|e| LlmError::InvalidResponse(format!("memory bank JSON could not be parsed: {}", e)))?;

    let mut report = GenerateReport::default();
    for file in bank.files {
        let Some(kind) = generated_kind(&file.filename) else {
            warn!(filename = %file.filename, "generate: not a memory bank document, skipping");
            report.ignored.push(file.filename);
            continue;
        };

        let current = store.read_one(kind)?;
        if !kind.is_placeholder(&current) {
            debug!(%kind, "generate: document has content, keeping it");
            report.kept.push(kind);
            continue;
        }
        store.write_kind(kind, &file.content)?;
        report.written.push(kind);
    }

    info!(written = report.written.len(), kept = report.kept.len(), "Memory bank generated");
    Ok(report)
}

fn generated_kind(filename: &str) -> Option<DocumentKind> {
    let path = Path::new(filename);
    let ext_ok = path.extension().map(|e| e == "md").unwrap_or(true);
    let stem = path.file_stem()?.to_str()?;
    if ext_ok { stem.parse().ok() } else { None }
}

/// Body of a Markdown code fence, or the trimmed input when there is none
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// plan

/// Result of a successful `plan`
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// Brief that received the plan
    pub path: PathBuf,
    /// Generated plan text
    pub plan: String,
    /// Whether a clarification section was added
    pub clarified: bool,
    pub provider: &'static str,
}

#[derive(Serialize)]
struct ClarifyPrompt<'a> {
    instruction: &'a str,
    referenced_files: &'a [String],
    technologies: &'a [String],
}

/// Generate a plan for an instruction brief and append it in place
///
/// With `clarify`, the model's questions are shown on `console` and answers
/// are read from it; otherwise marker text halts the run.
pub async fn plan<F, R, W>(
    ws: &Workspace,
    instruction_path: &Path,
    clarify: bool,
    console: &mut Console<R, W>,
    connect: F,
) -> Result<PlanOutcome, PlannerError>
where
    F: FnOnce() -> Result<Arc<dyn LlmClient>, PlannerError>,
    R: BufRead,
    W: Write,
{
    debug!(?instruction_path, %clarify, "plan: called");
    let store = ws.store();
    let docs = store.read_all()?;
    let instruction = InstructionDocument::load(ws.root(), instruction_path)?;
    let gate = ws.gate();

    let text_analysis = analyze_text(&instruction.text).unwrap_or_else(|e| {
        warn!(error = %e, "plan: instruction analysis failed");
        TextAnalysis::default()
    });

    if !clarify {
        gate.check(&instruction.text)?;
    }

    let synth = ws.synthesizer(connect()?);
    let project = scan_project(ws.root(), &ws.config().memory.dir);
    let enrichment = Enrichment::new(text_analysis, Some(&project));

    let mut working = instruction.text.clone();
    let mut clarified = false;
    if clarify {
        working = clarify_rounds(ws, &synth, &gate, &working, &enrichment, console).await?;
        clarified = working != instruction.text;
    }

    let prompt = assemble_with(&ws.loader(), &docs, &working, Some(&enrichment))?;
    let plan = synth.synthesize(&prompt).await?;

    instruction.save(&append_plan(&working, &plan))?;
    info!(path = ?instruction.path, plan_len = plan.len(), "Plan written");

    Ok(PlanOutcome {
        path: instruction.path,
        plan,
        clarified,
        provider: synth.provider(),
    })
}

async fn clarify_rounds<R: BufRead, W: Write>(
    ws: &Workspace,
    synth: &PlanSynthesizer,
    gate: &ClarificationGate,
    text: &str,
    enrichment: &Enrichment,
    console: &mut Console<R, W>,
) -> Result<String, PlannerError> {
    let settings = &ws.config().clarify;
    let mut working = text.to_string();
    let mut markers = gate.found_markers(text);
    debug!(?markers, max_rounds = settings.max_rounds, "clarify_rounds: called");

    for round in 1..=settings.max_rounds {
        let prompt = ws.loader().render(
            "clarify",
            &ClarifyPrompt {
                instruction: &working,
                referenced_files: &enrichment.text.file_references,
                technologies: &enrichment.technologies,
            },
        )?;
        let questions = synth.ask(CLARIFY_SYSTEM_PROMPT, &prompt).await?;

        if gate::is_clear(&questions) {
            info!(%round, "Model reports no clarification needed");
            break;
        }

        console.say("\nClarifying questions:")?;
        console.say(questions.trim())?;
        console.say(&format!(
            "\nAnswer below (type '{}' on a new line when finished):",
            settings.sentinel
        ))?;
        let answers = console.read_until(&settings.sentinel)?;

        if answers.trim().is_empty() {
            debug!(%round, "clarify_rounds: no answers given");
            continue;
        }

        working = gate::append_clarifications(&working, &questions, &answers);
        markers = gate.found_markers(&answers);
        if markers.is_empty() {
            debug!(%round, "clarify_rounds: answers resolved the brief");
            break;
        }
    }

    if markers.is_empty() {
        Ok(working)
    } else {
        Err(PlannerError::ClarificationRequired { markers })
    }
}

// update

/// Result of `update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Document rewritten at this path
    Updated(PathBuf),
    /// Operator gave no input; nothing sent, nothing written
    NoInput,
}

#[derive(Serialize)]
struct UpdatePrompt<'a> {
    file_name: &'a str,
    current: &'a str,
    update: &'a str,
}

/// Merge operator notes into one memory document through the model
pub async fn update<F, R, W>(
    ws: &Workspace,
    name: &str,
    console: &mut Console<R, W>,
    connect: F,
) -> Result<UpdateOutcome, PlannerError>
where
    F: FnOnce() -> Result<Arc<dyn LlmClient>, PlannerError>,
    R: BufRead,
    W: Write,
{
    debug!(%name, "update: called");
    let kind: DocumentKind = name.parse()?;
    let store = ws.store();
    if !store.exists() {
        return Err(PlannerError::NotInitialized {
            dir: store.dir().to_path_buf(),
        });
    }
    let current = store.read_one(kind)?;

    let sentinel = &ws.config().clarify.sentinel;
    console.say(&format!(
        "What would you like to add or change in {}? (type '{}' on a new line when finished)",
        kind.file_name(),
        sentinel
    ))?;
    let notes = console.read_until(sentinel)?;
    if notes.trim().is_empty() {
        info!(%kind, "No update text given, leaving document unchanged");
        return Ok(UpdateOutcome::NoInput);
    }

    let prompt = ws.loader().render(
        "update",
        &UpdatePrompt {
            file_name: &kind.file_name(),
            current: &current,
            update: &notes,
        },
    )?;
    let synth = ws.synthesizer(connect()?);
    let merged = synth.ask(UPDATE_SYSTEM_PROMPT, &prompt).await?;

    let path = store.write_kind(kind, merged.trim_end())?;
    Ok(UpdateOutcome::Updated(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::updater::PLAN_HEADING;
    use std::fs;
    use std::io::Cursor;
    use tempfile::{TempDir, tempdir};

    fn workspace() -> (TempDir, Workspace) {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), Config::default());
        (dir, ws)
    }

    fn console(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn connected(mock: &Arc<MockLlmClient>) -> impl FnOnce() -> Result<Arc<dyn LlmClient>, PlannerError> + use<> {
        let client: Arc<dyn LlmClient> = mock.clone();
        move || Ok(client)
    }

    fn never() -> Result<Arc<dyn LlmClient>, PlannerError> {
        Err(PlannerError::MissingCredentials {
            vars: vec!["OPENAI_API_KEY".to_string()],
        })
    }

    #[tokio::test]
    async fn test_plan_appends_plan() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::write(dir.path().join("brief.txt"), "Add a login page").unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&["STEP 1: Do X"]));

        let outcome = plan(&ws, Path::new("brief.txt"), false, &mut console(""), connected(&mock))
            .await
            .unwrap();

        let text = fs::read_to_string(dir.path().join("brief.txt")).unwrap();
        assert_eq!(text, format!("Add a login page\n\n{}\nSTEP 1: Do X", PLAN_HEADING));
        assert_eq!(outcome.plan, "STEP 1: Do X");
        assert!(!outcome.clarified);
        assert_eq!(outcome.provider, "mock");

        let prompt = &mock.requests()[0].messages[0].content;
        assert!(prompt.contains("# projectbrief.md\n# Project Brief"));
        assert!(prompt.contains("Add a login page"));
    }

    #[tokio::test]
    async fn test_plan_without_memory_bank() {
        let (dir, ws) = workspace();
        fs::write(dir.path().join("brief.txt"), "x").unwrap();
        let err = plan(&ws, Path::new("brief.txt"), false, &mut console(""), never)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::NotInitialized { .. }));
    }

    #[tokio::test]
    async fn test_plan_missing_instruction() {
        let (_dir, ws) = workspace();
        init(&ws).unwrap();
        let err = plan(&ws, Path::new("nope.txt"), false, &mut console(""), never)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::MissingInstruction { .. }));
    }

    #[tokio::test]
    async fn test_marker_halts_before_credentials() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::write(dir.path().join("brief.txt"), "Use the TBD database").unwrap();

        let err = plan(&ws, Path::new("brief.txt"), false, &mut console(""), never)
            .await
            .unwrap_err();

        assert!(err.is_clarification());
        assert_eq!(
            fs::read_to_string(dir.path().join("brief.txt")).unwrap(),
            "Use the TBD database"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_surface_after_gate() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::write(dir.path().join("brief.txt"), "Add search").unwrap();
        let err = plan(&ws, Path::new("brief.txt"), false, &mut console(""), never)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_brief_untouched() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::write(dir.path().join("brief.txt"), "Add search").unwrap();
        let mock = Arc::new(MockLlmClient::new(vec![]));

        let err = plan(&ws, Path::new("brief.txt"), false, &mut console(""), connected(&mock))
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Provider(_)));
        assert_eq!(fs::read_to_string(dir.path().join("brief.txt")).unwrap(), "Add search");
    }

    #[tokio::test]
    async fn test_clarify_answers_resolve_markers() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::write(dir.path().join("brief.txt"), "Store sessions in TBD").unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&["1. Which store?", "STEP 1: Use Redis"]));
        let mut console = console("Redis\nEXIT\n");

        let outcome = plan(&ws, Path::new("brief.txt"), true, &mut console, connected(&mock))
            .await
            .unwrap();

        assert!(outcome.clarified);
        let text = fs::read_to_string(dir.path().join("brief.txt")).unwrap();
        assert!(text.starts_with("Store sessions in TBD\n\n## Clarifications\n\n1. Which store?\n\nRedis"));
        assert!(text.ends_with("## LLM-Generated Plan:\nSTEP 1: Use Redis"));

        let shown = String::from_utf8(console.output).unwrap();
        assert!(shown.contains("1. Which store?"));
        assert!(shown.contains("'EXIT'"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_clarify_empty_answers_keep_gate_closed() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::write(dir.path().join("brief.txt"), "Store sessions in TBD").unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&["1. Which store?"]));

        let err = plan(&ws, Path::new("brief.txt"), true, &mut console("EXIT\n"), connected(&mock))
            .await
            .unwrap_err();

        assert!(err.is_clarification());
        assert_eq!(
            fs::read_to_string(dir.path().join("brief.txt")).unwrap(),
            "Store sessions in TBD"
        );
    }

    #[tokio::test]
    async fn test_clarify_skipped_when_model_is_satisfied() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::write(dir.path().join("brief.txt"), "Add a health endpoint").unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&["No clarification needed.", "STEP 1: Add /health"]));
        let mut console = console("");

        let outcome = plan(&ws, Path::new("brief.txt"), true, &mut console, connected(&mock))
            .await
            .unwrap();

        assert!(!outcome.clarified);
        assert!(console.output.is_empty());
        let text = fs::read_to_string(dir.path().join("brief.txt")).unwrap();
        assert!(!text.contains("## Clarifications"));
    }

    #[tokio::test]
    async fn test_update_rewrites_document() {
        let (_dir, ws) = workspace();
        init(&ws).unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&["# Progress\n\n- Login works\n"]));

        let outcome = update(&ws, "progress", &mut console("Login works\nEXIT\n"), connected(&mock))
            .await
            .unwrap();

        let path = ws.store().path_of(DocumentKind::Progress);
        assert_eq!(outcome, UpdateOutcome::Updated(path.clone()));
        assert_eq!(fs::read_to_string(path).unwrap(), "# Progress\n\n- Login works");
        let prompt = &mock.requests()[0].messages[0].content;
        assert!(prompt.contains("progress.md"));
        assert!(prompt.contains("Login works"));
    }

    #[tokio::test]
    async fn test_update_unknown_name_creates_nothing() {
        let (_dir, ws) = workspace();
        init(&ws).unwrap();
        let err = update(&ws, "notes", &mut console("x\nEXIT\n"), never).await.unwrap_err();
        assert!(matches!(err, PlannerError::UnknownDocument { .. }));
        assert!(!ws.store().dir().join("notes.md").exists());
    }

    #[tokio::test]
    async fn test_update_without_input_skips_model() {
        let (_dir, ws) = workspace();
        init(&ws).unwrap();
        let outcome = update(&ws, "techContext", &mut console("EXIT\n"), never).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::NoInput);
    }

    #[tokio::test]
    async fn test_update_requires_memory_bank() {
        let (_dir, ws) = workspace();
        let err = update(&ws, "progress", &mut console(""), never).await.unwrap_err();
        assert!(matches!(err, PlannerError::NotInitialized { .. }));
    }

    #[tokio::test]
    async fn test_generate_fills_placeholders_only() {
        let (_dir, ws) = workspace();
        init(&ws).unwrap();
        let store = ws.store();
        store.write_kind(DocumentKind::TechContext, "# Tech Context\n\nRust").unwrap();

        let reply = r##"```json
{"files": [
  {"filename": "projectbrief.md", "content": "# Project Brief\n\nA planner"},
  {"filename": "techContext.md", "content": "# Tech Context\n\nPython"},
  {"filename": "notes.md", "content": "stray"}
]}
```"##;
        let mock = Arc::new(MockLlmClient::with_texts(&[reply]));

        let report = generate(&ws, connected(&mock)).await.unwrap();

        assert_eq!(report.written, vec![DocumentKind::ProjectBrief]);
        assert_eq!(report.kept, vec![DocumentKind::TechContext]);
        assert_eq!(report.ignored, vec!["notes.md"]);
        assert_eq!(
            store.read_one(DocumentKind::ProjectBrief).unwrap(),
            "# Project Brief\n\nA planner"
        );
        assert_eq!(store.read_one(DocumentKind::TechContext).unwrap(), "# Tech Context\n\nRust");
        assert!(!store.dir().join("notes.md").exists());
    }

    #[tokio::test]
    async fn test_generate_prompt_carries_source_files() {
        let (dir, ws) = workspace();
        init(&ws).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/queue.rs"), "pub struct JobQueue;\n").unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&[r#"{"files": []}"#]));

        generate(&ws, connected(&mock)).await.unwrap();

        let prompt = &mock.requests()[0].messages[0].content;
        assert!(prompt.contains("# SOURCE FILES"));
        assert!(prompt.contains("FILE: src/queue.rs (Rust)"));
        assert!(prompt.contains("pub struct JobQueue;"));
        assert!(prompt.contains("File types: .rs (1)"));
        assert!(!prompt.contains("Project Brief"), "memory bank placeholders are not source");
    }

    #[tokio::test]
    async fn test_generate_invalid_json_keeps_scaffold() {
        let (_dir, ws) = workspace();
        init(&ws).unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&["Sure! Here are your files."]));

        let err = generate(&ws, connected(&mock)).await.unwrap_err();
        assert!(matches!(err, PlannerError::Provider(LlmError::InvalidResponse(_))));
        let brief = ws.store().read_one(DocumentKind::ProjectBrief).unwrap();
        assert!(DocumentKind::ProjectBrief.is_placeholder(&brief));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
    }
}

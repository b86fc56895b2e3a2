//! Context assembly: memory bank + instructions into one planning prompt

use serde::Serialize;
use tracing::debug;

use crate::analysis::{ProjectInfo, TextAnalysis};
use crate::error::PlannerError;
use crate::memory::{MemoryDocument, concatenate};
use crate::prompts::PromptLoader;

/// Template used for the planning prompt
pub const PLAN_TEMPLATE: &str = "plan";

/// Optional extras folded into the planning prompt
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub text: TextAnalysis,
    pub technologies: Vec<String>,
}

impl Enrichment {
    pub fn new(text: TextAnalysis, project: Option<&ProjectInfo>) -> Self {
        Self {
            text,
            technologies: project.map(ProjectInfo::technologies).unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct PlanPrompt<'a> {
    memory: String,
    instruction: &'a str,
    technologies: &'a [String],
    referenced_files: &'a [String],
    commands: &'a [String],
    dependencies: &'a [String],
    code_snippets: &'a [String],
}

/// Assemble the planning prompt from the embedded template
pub fn assemble(docs: &[MemoryDocument], instruction: &str) -> Result<String, PlannerError> {
    assemble_with(&PromptLoader::embedded_only(), docs, instruction, None)
}

/// Assemble the planning prompt through `loader`, with optional enrichment
///
/// Memory documents are rendered in the order given (`read_all` sorts them).
pub fn assemble_with(
    loader: &PromptLoader,
    docs: &[MemoryDocument],
    instruction: &str,
    enrichment: Option<&Enrichment>,
) -> Result<String, PlannerError> {
    debug!(docs = docs.len(), instruction_len = instruction.len(), enriched = enrichment.is_some(), "assemble_with: called");
    let empty = Enrichment::default();
    let extra = enrichment.unwrap_or(&empty);

    let prompt = PlanPrompt {
        memory: concatenate(docs),
        instruction,
        technologies: &extra.technologies,
        referenced_files: &extra.text.file_references,
        commands: &extra.text.command_references,
        dependencies: &extra.text.dependency_lines,
        code_snippets: &extra.text.code_snippets,
    };

    let rendered = loader.render(PLAN_TEMPLATE, &prompt)?;
    debug!(prompt_len = rendered.len(), "assemble_with: rendered");
    Ok(rendered)
}

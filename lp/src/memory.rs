//! Memory Bank store
//!
//! A fixed, closed set of Markdown documents kept in a project-local
//! directory. Every operation is relative to an explicit project root.
//!
//! ```text
//! <root>/memory-bank/
//! ├── projectbrief.md
//! ├── productContext.md
//! ├── activeContext.md
//! ├── systemPatterns.md
//! ├── techContext.md
//! └── progress.md
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::PlannerError;
use crate::persist::write_atomic;

/// Default memory directory name under the project root
pub const DEFAULT_MEMORY_DIR: &str = "memory-bank";

/// Markdown extension recognized by `read_all`
const MARKDOWN_EXT: &str = "md";

/// One of the six recognized memory documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    ProjectBrief,
    ProductContext,
    ActiveContext,
    SystemPatterns,
    TechContext,
    Progress,
}

impl DocumentKind {
    /// All documents, in dependency order (brief first, progress last)
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::ProjectBrief,
        DocumentKind::ProductContext,
        DocumentKind::ActiveContext,
        DocumentKind::SystemPatterns,
        DocumentKind::TechContext,
        DocumentKind::Progress,
    ];

    /// Logical name, also the file stem
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "projectbrief",
            Self::ProductContext => "productContext",
            Self::ActiveContext => "activeContext",
            Self::SystemPatterns => "systemPatterns",
            Self::TechContext => "techContext",
            Self::Progress => "progress",
        }
    }

    /// Human title used for the placeholder heading
    pub fn title(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "Project Brief",
            Self::ProductContext => "Product Context",
            Self::ActiveContext => "Active Context",
            Self::SystemPatterns => "System Patterns",
            Self::TechContext => "Tech Context",
            Self::Progress => "Progress",
        }
    }

    fn purpose(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "Core requirements, goals and scope. Every other document builds on this one.",
            Self::ProductContext => "Why the project exists, the problems it solves and the intended user experience.",
            Self::ActiveContext => "Current focus, recent changes, next steps and open decisions.",
            Self::SystemPatterns => "Architecture, key technical decisions and how components relate.",
            Self::TechContext => "Technologies, development setup, constraints and dependencies.",
            Self::Progress => "What works, what is left to build, current status and known issues.",
        }
    }

    /// File name inside the memory directory
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name(), MARKDOWN_EXT)
    }

    /// Content written when the document is first scaffolded
    pub fn placeholder(&self) -> String {
        format!("# {}\n\n<!-- {} -->\n", self.title(), self.purpose())
    }

    /// True when `content` is still the untouched scaffold
    pub fn is_placeholder(&self, content: &str) -> bool {
        content == self.placeholder()
    }

    /// Logical names of every document
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.name()).collect()
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DocumentKind {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| PlannerError::UnknownDocument { name: s.to_string() })
    }
}

/// A Markdown document loaded from the memory directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDocument {
    /// File stem (the logical name for closed-set documents)
    pub name: String,
    /// Closed-set kind, if the file is one of the six
    pub kind: Option<DocumentKind>,
    /// Full path to the file
    pub path: PathBuf,
    /// Raw Markdown content
    pub content: String,
}

impl MemoryDocument {
    /// File name including extension
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, MARKDOWN_EXT)
    }
}

/// Outcome of `ensure_initialized`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Whether the memory directory itself was created
    pub created_dir: bool,
    /// Documents scaffolded by this call
    pub created: Vec<DocumentKind>,
    /// Documents that were already present and left untouched
    pub existing: Vec<DocumentKind>,
}

/// Directory-backed Memory Bank
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    /// Store rooted at `<root>/memory-bank`
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_dir_name(root, DEFAULT_MEMORY_DIR)
    }

    /// Store rooted at `<root>/<dir_name>`
    pub fn with_dir_name(root: impl AsRef<Path>, dir_name: &str) -> Self {
        let dir = root.as_ref().join(dir_name);
        debug!(?dir, "MemoryStore::with_dir_name: called");
        Self { dir }
    }

    /// Memory directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a closed-set document
    pub fn path_of(&self, kind: DocumentKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Whether the memory directory exists
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Create the directory and any missing documents; existing files are never touched
    pub fn ensure_initialized(&self) -> Result<InitReport, PlannerError> {
        debug!(dir = ?self.dir, "MemoryStore::ensure_initialized: called");
        let mut report = InitReport::default();

        if !self.exists() {
            debug!("MemoryStore::ensure_initialized: creating memory directory");
            fs::create_dir_all(&self.dir).map_err(|e| PlannerError::io(&self.dir, e))?;
            report.created_dir = true;
        }

        for kind in DocumentKind::ALL {
            let path = self.path_of(kind);
            if path.exists() {
                debug!(%kind, "MemoryStore::ensure_initialized: document exists, skipping");
                report.existing.push(kind);
                continue;
            }
            fs::write(&path, kind.placeholder()).map_err(|e| PlannerError::io(&path, e))?;
            debug!(%kind, "MemoryStore::ensure_initialized: document created");
            report.created.push(kind);
        }

        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "Memory bank initialized"
        );
        Ok(report)
    }

    /// Load every `.md` file in the memory directory, sorted by file name
    pub fn read_all(&self) -> Result<Vec<MemoryDocument>, PlannerError> {
        debug!(dir = ?self.dir, "MemoryStore::read_all: called");
        if !self.exists() {
            debug!("MemoryStore::read_all: memory directory missing");
            return Err(PlannerError::NotInitialized { dir: self.dir.clone() });
        }

        let mut docs = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| PlannerError::io(&self.dir, e))? {
            let entry = entry.map_err(|e| PlannerError::io(&self.dir, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != MARKDOWN_EXT).unwrap_or(true) {
                continue;
            }

            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string();
            let content = fs::read_to_string(&path).map_err(|e| PlannerError::io(&path, e))?;
            debug!(%name, content_len = content.len(), "MemoryStore::read_all: loaded document");
            docs.push(MemoryDocument {
                kind: name.parse().ok(),
                name,
                path,
                content,
            });
        }

        docs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(docs)
    }

    /// Read a single closed-set document
    pub fn read_one(&self, kind: DocumentKind) -> Result<String, PlannerError> {
        debug!(%kind, "MemoryStore::read_one: called");
        if !self.exists() {
            return Err(PlannerError::NotInitialized { dir: self.dir.clone() });
        }
        let path = self.path_of(kind);
        fs::read_to_string(&path).map_err(|e| PlannerError::io(&path, e))
    }

    /// Replace a closed-set document, validating the name first
    pub fn write_one(&self, name: &str, content: &str) -> Result<PathBuf, PlannerError> {
        debug!(%name, content_len = content.len(), "MemoryStore::write_one: called");
        let kind: DocumentKind = name.parse()?;
        self.write_kind(kind, content)
    }

    /// Replace a closed-set document
    pub fn write_kind(&self, kind: DocumentKind, content: &str) -> Result<PathBuf, PlannerError> {
        fs::create_dir_all(&self.dir).map_err(|e| PlannerError::io(&self.dir, e))?;
        let path = self.path_of(kind);
        write_atomic(&path, content)?;
        info!(%kind, "Memory document updated");
        Ok(path)
    }
}

/// Render documents as one Markdown blob: `# <file>` header per document, blank line between
pub fn concatenate(docs: &[MemoryDocument]) -> String {
    docs.iter()
        .map(|d| format!("# {}\n{}", d.file_name(), d.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

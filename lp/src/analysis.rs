//! Model-free analysis of instructions and the project tree
//!
//! Both results only enrich prompts. Nothing here fails a plan: an unreadable
//! entry is skipped and logged.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Keywords that mark a line as talking about dependencies
const DEPENDENCY_KEYWORDS: [&str; 7] = ["require", "import", "install", "package", "dependency", "module", "library"];

/// Directories never descended into, besides hidden ones and the memory dir
const SKIP_DIRS: [&str; 4] = ["node_modules", "venv", "target", "__pycache__"];

/// Source files handed to `init --generate`, newest first
pub const MAX_SOURCE_FILES: usize = 15;

/// Per-file character cap for source content
pub const MAX_SOURCE_CHARS: usize = 6000;

/// Extensions read as source, with the label shown to the model
const SOURCE_EXTENSIONS: &[(&str, &str)] = &[
    (".py", "Python"),
    (".js", "JavaScript"),
    (".jsx", "React"),
    (".ts", "TypeScript"),
    (".tsx", "React TypeScript"),
    (".java", "Java"),
    (".c", "C"),
    (".cpp", "C++"),
    (".h", "C/C++ Header"),
    (".cs", "C#"),
    (".rb", "Ruby"),
    (".go", "Go"),
    (".php", "PHP"),
    (".swift", "Swift"),
    (".kt", "Kotlin"),
    (".rs", "Rust"),
    (".html", "HTML"),
    (".css", "CSS"),
    (".scss", "SCSS"),
    (".sql", "SQL"),
    (".sh", "Shell"),
    (".toml", "TOML"),
    (".yml", "YAML"),
    (".yaml", "YAML"),
    (".json", "JSON"),
];

/// Language markers: a leading dot is an extension, anything else an exact file name
const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    ("python", &[".py", "requirements.txt", "setup.py", "Pipfile", "pyproject.toml"]),
    ("javascript", &[".js", ".jsx", "package.json"]),
    ("typescript", &[".ts", ".tsx", "tsconfig.json"]),
    ("java", &[".java", "pom.xml", "build.gradle"]),
    ("ruby", &[".rb", "Gemfile"]),
    ("go", &[".go", "go.mod"]),
    ("rust", &[".rs", "Cargo.toml"]),
    ("php", &[".php", "composer.json"]),
    ("c#", &[".cs", ".csproj", ".sln"]),
];

/// Framework markers, matched as substrings of the root-relative path
const FRAMEWORK_MARKERS: &[(&str, &[&str])] = &[
    ("django", &["settings.py", "urls.py", "wsgi.py", "asgi.py"]),
    ("flask", &["app.py", "flask"]),
    ("react", &["react", ".jsx", ".tsx"]),
    ("vue", &[".vue"]),
    ("angular", &["angular.json", ".component.ts"]),
    ("spring", &["Application.java", "SpringApplication"]),
    ("rails", &["config/routes.rb"]),
    ("express", &["express"]),
    ("laravel", &["artisan"]),
];

/// What the instruction text mentions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextAnalysis {
    /// Bodies of fenced code blocks
    pub code_snippets: Vec<String>,
    /// Path-like tokens with an extension (`src/main.rs`, `config.yml`)
    pub file_references: Vec<String>,
    /// Inline code spans that look like commands (contain a space, not a URL)
    pub command_references: Vec<String>,
    /// Lines that mention dependency keywords
    pub dependency_lines: Vec<String>,
}

/// Extract snippets and references from instruction text
pub fn analyze_text(text: &str) -> Result<TextAnalysis, regex::Error> {
    debug!(text_len = text.len(), "analyze_text: called");
    let fence = Regex::new(r"(?s)```[\w+-]*\n(.*?)\n```")?;
    let file_ref = Regex::new(r"(?m)(?:^|\s)([A-Za-z0-9_\-./]+\.[A-Za-z0-9]+)")?;
    let inline = Regex::new(r"`([^`\n]+)`")?;

    let code_snippets: Vec<String> = fence.captures_iter(text).map(|c| c[1].to_string()).collect();

    // Inline spans and file names are only looked for outside fenced blocks
    let prose = fence.replace_all(text, "\n");

    let file_references = unique(
        file_ref
            .captures_iter(&prose)
            .map(|c| c[1].to_string())
            .filter(|f| !f.ends_with('.')),
    );

    let command_references = unique(
        inline
            .captures_iter(&prose)
            .map(|c| c[1].trim().to_string())
            .filter(|c| c.contains(' ') && !c.starts_with("http")),
    );

    let dependency_lines = unique(
        prose
            .lines()
            .map(str::trim)
            .filter(|line| {
                let lower = line.to_lowercase();
                DEPENDENCY_KEYWORDS.iter().any(|k| lower.contains(k))
            })
            .map(str::to_string),
    );

    let analysis = TextAnalysis {
        code_snippets,
        file_references,
        command_references,
        dependency_lines,
    };
    debug!(
        snippets = analysis.code_snippets.len(),
        files = analysis.file_references.len(),
        commands = analysis.command_references.len(),
        deps = analysis.dependency_lines.len(),
        "analyze_text: done"
    );
    Ok(analysis)
}

fn unique(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items.filter(|i| seen.insert(i.clone())).collect()
}

/// Shape of the project tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectInfo {
    pub project_name: String,
    /// Top-level directories (sorted)
    pub directories: Vec<String>,
    /// Top-level files (sorted)
    pub files: Vec<String>,
    /// Extension (with dot) to file count, whole tree
    pub file_types: BTreeMap<String, usize>,
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    /// Top-level README.md, if any
    pub readme: Option<String>,
}

impl ProjectInfo {
    /// Languages followed by frameworks
    pub fn technologies(&self) -> Vec<String> {
        self.languages.iter().chain(self.frameworks.iter()).cloned().collect()
    }
}

/// Walk the project tree under `root`
///
/// Hidden entries, the memory directory (`memory_dir`, relative to `root`) and
/// common dependency/build directories are skipped.
pub fn scan_project(root: &Path, memory_dir: &str) -> ProjectInfo {
    debug!(?root, %memory_dir, "scan_project: called");
    let mut info = ProjectInfo {
        project_name: root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| ".".to_string()),
        ..Default::default()
    };
    let mut languages = BTreeSet::new();
    let mut frameworks = BTreeSet::new();

    for entry in project_entries(root, memory_dir) {
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.file_type().is_dir() {
            if entry.depth() == 1 {
                info.directories.push(name);
            }
            continue;
        }

        let rel = relative(root, entry.path());

        if entry.depth() == 1 {
            if name.eq_ignore_ascii_case("readme.md") {
                match fs::read_to_string(entry.path()) {
                    Ok(text) => info.readme = Some(text),
                    Err(e) => warn!(path = ?entry.path(), error = %e, "scan_project: unreadable README"),
                }
            }
            info.files.push(name.clone());
        }

        let ext = extension(&name);
        if let Some(ext) = &ext {
            *info.file_types.entry(ext.clone()).or_insert(0) += 1;
        }

        for (lang, markers) in LANGUAGE_MARKERS {
            let hit = markers.iter().any(|m| match m.strip_prefix('.') {
                Some(_) => ext.as_deref() == Some(*m),
                None => name == *m,
            });
            if hit {
                languages.insert(lang.to_string());
            }
        }
        for (framework, markers) in FRAMEWORK_MARKERS {
            if markers.iter().any(|m| rel.contains(m)) {
                frameworks.insert(framework.to_string());
            }
        }
    }

    info.languages = languages.into_iter().collect();
    info.frameworks = frameworks.into_iter().collect();
    debug!(languages = ?info.languages, frameworks = ?info.frameworks, "scan_project: done");
    info
}

/// One source file handed to the model, possibly cut short
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    /// Root-relative path with `/` separators
    pub path: String,
    pub language: String,
    pub content: String,
    /// Content was cut at `MAX_SOURCE_CHARS`
    pub truncated: bool,
}

/// Read the most recently modified source files under `root`
///
/// At most `MAX_SOURCE_FILES` non-empty files are returned, newest first, each
/// capped at `MAX_SOURCE_CHARS` characters. Skips the same entries as
/// `scan_project`.
pub fn collect_sources(root: &Path, memory_dir: &str) -> Vec<SourceFile> {
    debug!(?root, %memory_dir, "collect_sources: called");
    let mut candidates: Vec<(Reverse<Option<SystemTime>>, String, &'static str, PathBuf)> = Vec::new();

    for entry in project_entries(root, memory_dir) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let Some(language) = extension(&name).and_then(|ext| source_language(&ext)) else {
            continue;
        };
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        candidates.push((
            Reverse(modified),
            relative(root, entry.path()),
            language,
            entry.into_path(),
        ));
    }
    candidates.sort();

    let mut sources = Vec::new();
    for (_, path, language, full) in candidates {
        if sources.len() == MAX_SOURCE_FILES {
            break;
        }
        let text = match fs::read_to_string(&full) {
            Ok(text) => text,
            Err(e) => {
                warn!(?full, error = %e, "collect_sources: unreadable file");
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }
        let (content, truncated) = match text.char_indices().nth(MAX_SOURCE_CHARS) {
            Some((cut, _)) => (text[..cut].to_string(), true),
            None => (text, false),
        };
        sources.push(SourceFile {
            path,
            language: language.to_string(),
            content,
            truncated,
        });
    }

    debug!(count = sources.len(), "collect_sources: done");
    sources
}

fn source_language(ext: &str) -> Option<&'static str> {
    SOURCE_EXTENSIONS.iter().find(|(e, _)| *e == ext).map(|(_, lang)| *lang)
}

fn project_entries(root: &Path, memory_dir: &str) -> impl Iterator<Item = DirEntry> + use<> {
    let memory_path = root.join(memory_dir);
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| e.depth() == 0 || !skipped(e, &memory_path))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "scan_project: skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.depth() > 0)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
}

fn skipped(entry: &DirEntry, memory_path: &Path) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || (entry.file_type().is_dir() && (entry.path() == memory_path || SKIP_DIRS.contains(&&*name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_analyze_text_extracts_everything() {
        let text = "Update src/api/handler.rs and config.yml.\n\
                    Run `cargo test --all` then `ls`.\n\
                    Install the serde package.\n\
                    ```rust\nfn main() {}\n```\n\
                    See https://example.com/docs.html for details.\n";
        let a = analyze_text(text).unwrap();

        assert_eq!(a.code_snippets, vec!["fn main() {}"]);
        assert_eq!(a.file_references, vec!["src/api/handler.rs", "config.yml"]);
        assert_eq!(a.command_references, vec!["cargo test --all"]);
        assert_eq!(a.dependency_lines, vec!["Install the serde package."]);
    }

    #[test]
    fn test_analyze_text_plain_prose_is_empty() {
        let a = analyze_text("Make the button blue").unwrap();
        assert_eq!(a, TextAnalysis::default());
    }

    #[test]
    fn test_analyze_text_deduplicates() {
        let a = analyze_text("edit main.rs\nthen edit main.rs again").unwrap();
        assert_eq!(a.file_references, vec!["main.rs"]);
    }

    #[test]
    fn test_inline_spans_inside_fences_are_not_commands() {
        let a = analyze_text("```\nlet s = `not a command`;\n```\n").unwrap();
        assert!(a.command_references.is_empty());
        assert_eq!(a.code_snippets.len(), 1);
    }

    #[test]
    fn test_scan_project_detects_languages_and_skips_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("Cargo.toml"), "[package]").unwrap();
        fs::write(root.join("README.md"), "# Demo").unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::create_dir_all(root.join("memory-bank")).unwrap();
        fs::write(root.join("memory-bank/app.py"), "").unwrap();
        fs::create_dir_all(root.join("node_modules/react")).unwrap();
        fs::write(root.join("node_modules/react/index.js"), "").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.go"), "").unwrap();

        let info = scan_project(root, "memory-bank");

        assert_eq!(info.languages, vec!["rust"]);
        assert!(info.frameworks.is_empty());
        assert_eq!(info.directories, vec!["src"]);
        assert_eq!(info.files, vec!["Cargo.toml", "README.md"]);
        assert_eq!(info.readme.as_deref(), Some("# Demo"));
        assert_eq!(info.file_types.get(".rs"), Some(&1));
        assert_eq!(info.file_types.get(".py"), None);
    }

    #[test]
    fn test_scan_project_frameworks() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(dir.path().join("config/routes.rb"), "").unwrap();
        fs::write(dir.path().join("manage.py"), "").unwrap();
        fs::write(dir.path().join("settings.py"), "").unwrap();

        let info = scan_project(dir.path(), "memory-bank");
        assert_eq!(info.languages, vec!["python", "ruby"]);
        assert_eq!(info.frameworks, vec!["django", "rails"]);
        assert_eq!(info.technologies(), vec!["python", "ruby", "django", "rails"]);
    }

    #[test]
    fn test_scan_project_skips_nested_memory_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs/memory")).unwrap();
        fs::write(root.join("docs/memory/app.py"), "").unwrap();
        fs::write(root.join("docs/build.rb"), "").unwrap();

        let info = scan_project(root, "docs/memory");
        assert_eq!(info.languages, vec!["ruby"]);
        assert_eq!(info.file_types.get(".py"), None);

        let sources = collect_sources(root, "docs/memory/");
        assert!(sources.iter().all(|s| !s.path.starts_with("docs/memory")));
    }

    #[test]
    fn test_collect_sources_reads_code_only() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n").unwrap();
        fs::write(root.join("src/empty.rs"), "   \n").unwrap();
        fs::write(root.join("notes.md"), "# Notes").unwrap();
        fs::write(root.join("logo.png"), "png").unwrap();
        fs::create_dir_all(root.join("memory-bank")).unwrap();
        fs::write(root.join("memory-bank/helper.py"), "print(1)").unwrap();

        let sources = collect_sources(root, "memory-bank");
        assert_eq!(
            sources,
            vec![SourceFile {
                path: "src/lib.rs".to_string(),
                language: "Rust".to_string(),
                content: "pub fn answer() -> u32 { 42 }\n".to_string(),
                truncated: false,
            }]
        );
    }

    #[test]
    fn test_collect_sources_caps_count_and_size() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for i in 0..MAX_SOURCE_FILES + 5 {
            fs::write(root.join(format!("mod{:02}.py", i)), "x = 1\n").unwrap();
        }
        fs::write(root.join("big.go"), "é".repeat(MAX_SOURCE_CHARS + 10)).unwrap();

        let sources = collect_sources(root, "memory-bank");
        assert_eq!(sources.len(), MAX_SOURCE_FILES);

        let big = sources.iter().find(|s| s.path == "big.go").unwrap();
        assert!(big.truncated);
        assert_eq!(big.content.chars().count(), MAX_SOURCE_CHARS);
    }

    #[test]
    fn test_collect_sources_newest_first() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("old.py"), "old = True\n").unwrap();
        fs::write(root.join("new.py"), "new = True\n").unwrap();
        fs::File::options()
            .write(true)
            .open(root.join("old.py"))
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000))
            .unwrap();

        let sources = collect_sources(root, "memory-bank");
        let paths: Vec<&str> = sources.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["new.py", "old.py"]);
    }
}

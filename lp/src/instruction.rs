//! Instruction Document - the user's task brief

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PlannerError;
use crate::persist::write_atomic;

/// A task brief loaded from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDocument {
    /// Resolved path of the brief
    pub path: PathBuf,
    /// Raw text, unparsed
    pub text: String,
}

impl InstructionDocument {
    /// Resolve `path` against `root` (absolute paths are kept) and load it
    pub fn load(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let path = resolve(root.as_ref(), path.as_ref());
        debug!(?path, "InstructionDocument::load: called");

        if !path.is_file() {
            debug!("InstructionDocument::load: file missing");
            return Err(PlannerError::MissingInstruction { path });
        }

        let text = fs::read_to_string(&path).map_err(|e| PlannerError::io(&path, e))?;
        debug!(text_len = text.len(), "InstructionDocument::load: loaded");
        Ok(Self { path, text })
    }

    /// Overwrite the brief atomically
    pub fn save(&self, text: &str) -> Result<(), PlannerError> {
        debug!(path = ?self.path, text_len = text.len(), "InstructionDocument::save: called");
        write_atomic(&self.path, text)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { root.join(path) }
}

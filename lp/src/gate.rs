//! Clarification gate
//!
//! Stops planning while a brief still carries placeholder markers such as
//! `TBD`. With `--clarify` the operator can answer model-generated questions
//! instead; the helpers for that round live here too.

use std::io::BufRead;

use tracing::debug;

use crate::error::PlannerError;

/// Reply that means the model has nothing to ask
pub const NO_CLARIFICATION: &str = "no clarification needed";

/// Heading for the appended question/answer section
pub const CLARIFICATIONS_HEADING: &str = "## Clarifications";

/// Marker check over instruction text
#[derive(Debug, Clone)]
pub struct ClarificationGate {
    markers: Vec<String>,
}

impl ClarificationGate {
    pub fn new(markers: Vec<String>) -> Self {
        let markers = markers.into_iter().filter(|m| !m.is_empty()).collect();
        Self { markers }
    }

    /// True when any marker occurs in `text` (case-sensitive substring)
    pub fn needs_clarification(&self, text: &str) -> bool {
        self.markers.iter().any(|m| text.contains(m.as_str()))
    }

    /// Markers present in `text`, in configured order
    pub fn found_markers(&self, text: &str) -> Vec<String> {
        self.markers.iter().filter(|m| text.contains(m.as_str())).cloned().collect()
    }

    /// Err(ClarificationRequired) when `text` still has markers
    pub fn check(&self, text: &str) -> Result<(), PlannerError> {
        let markers = self.found_markers(text);
        debug!(?markers, "ClarificationGate::check: called");
        if markers.is_empty() {
            Ok(())
        } else {
            Err(PlannerError::ClarificationRequired { markers })
        }
    }
}

impl Default for ClarificationGate {
    fn default() -> Self {
        Self::new(vec!["TBD".to_string()])
    }
}

/// Whether a clarify reply says the brief is already clear
pub fn is_clear(reply: &str) -> bool {
    let reply = reply.trim();
    reply.is_empty() || reply.to_lowercase().contains(NO_CLARIFICATION)
}

/// Read lines until `sentinel` (alone on a line, surrounding whitespace ignored) or EOF
pub fn read_until_sentinel(reader: impl BufRead, sentinel: &str) -> std::io::Result<String> {
    let mut out = String::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim() == sentinel {
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    debug!(len = out.len(), "read_until_sentinel: done");
    Ok(out)
}

/// Append questions and answers under the clarifications heading
pub fn append_clarifications(text: &str, questions: &str, answers: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}\n\n{}",
        text.trim_end(),
        CLARIFICATIONS_HEADING,
        questions.trim(),
        answers.trim_end()
    )
}

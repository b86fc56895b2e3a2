//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Planning prompt: memory bank, instructions and optional enrichment
pub const PLAN: &str = include_str!("../../prompts/plan.pmt");

/// Clarifying-questions prompt for `plan --clarify`
pub const CLARIFY: &str = include_str!("../../prompts/clarify.pmt");

/// Memory document merge prompt for `update`
pub const UPDATE: &str = include_str!("../../prompts/update.pmt");

/// Memory bank generation prompt for `init --generate`
pub const INIT: &str = include_str!("../../prompts/init.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "plan" => Some(PLAN),
        "clarify" => Some(CLARIFY),
        "update" => Some(UPDATE),
        "init" => Some(INIT),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

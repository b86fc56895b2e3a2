//! Appends a generated plan to an instruction brief

/// Heading written above every generated plan
pub const PLAN_HEADING: &str = "## LLM-Generated Plan:";

/// `instruction` + blank line + plan heading + `plan`
///
/// Not idempotent: each call adds another plan section.
pub fn append_plan(instruction: &str, plan: &str) -> String {
    format!("{}\n\n{}\n{}", instruction, PLAN_HEADING, plan)
}
